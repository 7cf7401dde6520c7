// SPDX-License-Identifier: AGPL-3.0-only

//! Contiguous range partitioning of global particle ids across workers.
//!
//! `[begin, end)` is split into `workers` shares. The first `size % workers`
//! shares receive one extra element, so share sizes differ by at most one and
//! the shares tile the range exactly once in rank order.
//!
//! | N  | P | shares        |
//! |----|---|---------------|
//! | 10 | 3 | 4, 3, 3       |
//! | 2  | 4 | 1, 1, 0, 0    |
//! | 8  | 2 | 4, 4          |

use crate::error::{OracleError, Result};
use std::ops::Range;

/// Share of `[begin, end)` owned by `worker` in a group of `workers`.
///
/// # Errors
///
/// [`OracleError::EmptyRange`] when `end <= begin`,
/// [`OracleError::WorkerOutOfRange`] when `workers == 0` or `worker >= workers`.
pub fn split_range(begin: usize, end: usize, worker: usize, workers: usize) -> Result<Range<usize>> {
    if end <= begin {
        return Err(OracleError::EmptyRange { begin, end });
    }
    if workers == 0 || worker >= workers {
        return Err(OracleError::WorkerOutOfRange { worker, workers });
    }
    let size = end - begin;
    let base = size / workers;
    let rem = size % workers;
    let start = begin + worker * base + worker.min(rem);
    let len = base + usize::from(worker < rem);
    Ok(start..start + len)
}

/// All shares of a global id range, one per rank.
#[derive(Debug, Clone)]
pub struct PartitionAssignment {
    ranges: Vec<Range<usize>>,
    n_global: usize,
}

impl PartitionAssignment {
    /// Partition `[0, n_global)` across `workers`.
    ///
    /// # Errors
    ///
    /// Propagates [`split_range`] preconditions.
    pub fn new(n_global: usize, workers: usize) -> Result<Self> {
        let ranges = (0..workers)
            .map(|w| split_range(0, n_global, w, workers))
            .collect::<Result<Vec<_>>>()?;
        if ranges.is_empty() {
            return Err(OracleError::WorkerOutOfRange { worker: 0, workers });
        }
        Ok(Self { ranges, n_global })
    }

    /// Number of ranks.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.ranges.len()
    }

    /// Total number of ids covered.
    #[must_use]
    pub const fn n_global(&self) -> usize {
        self.n_global
    }

    /// Id range owned by `rank`, if the rank exists.
    #[must_use]
    pub fn range(&self, rank: usize) -> Option<Range<usize>> {
        self.ranges.get(rank).cloned()
    }

    /// Share sizes in rank order.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.end - r.start).collect()
    }

    /// Rank owning `id`, or `None` when `id >= n_global`.
    #[must_use]
    pub fn owner_of(&self, id: usize) -> Option<usize> {
        if id >= self.n_global {
            return None;
        }
        // ranges are sorted and contiguous
        let idx = self.ranges.partition_point(|r| r.end <= id);
        Some(idx)
    }
}

/// Per-global-id ownership flags for the local worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipMask {
    owned: Vec<bool>,
}

impl OwnershipMask {
    /// Mask with no owned ids.
    #[must_use]
    pub fn empty(n_global: usize) -> Self {
        Self {
            owned: vec![false; n_global],
        }
    }

    /// Mask with every id owned (single-worker runs).
    #[must_use]
    pub fn all(n_global: usize) -> Self {
        Self {
            owned: vec![true; n_global],
        }
    }

    /// Mask owning the [`split_range`] share of `rank` in `[0, n_global)`.
    ///
    /// # Errors
    ///
    /// Propagates [`split_range`] preconditions.
    pub fn for_rank(n_global: usize, rank: usize, workers: usize) -> Result<Self> {
        let range = split_range(0, n_global, rank, workers)?;
        Ok(Self::from_range(n_global, range))
    }

    /// Mask owning exactly `range`. Ids past `n_global` are ignored.
    #[must_use]
    pub fn from_range(n_global: usize, range: Range<usize>) -> Self {
        let mut mask = Self::empty(n_global);
        for id in range.take_while(|&id| id < n_global) {
            mask.owned[id] = true;
        }
        mask
    }

    /// Mark `id` as owned.
    ///
    /// # Errors
    ///
    /// [`OracleError::IdOutOfRange`] when `id` is outside the mask.
    pub fn set(&mut self, id: usize) -> Result<()> {
        let slot = self.owned.get_mut(id).ok_or(OracleError::IdOutOfRange(id))?;
        *slot = true;
        Ok(())
    }

    /// Drop ownership of every id.
    pub fn clear(&mut self) {
        self.owned.iter_mut().for_each(|o| *o = false);
    }

    /// Whether the local worker owns `id`.
    #[must_use]
    pub fn is_owned(&self, id: usize) -> bool {
        self.owned.get(id).copied().unwrap_or(false)
    }

    /// Owned ids in ascending order.
    #[must_use]
    pub fn owned_ids(&self) -> Vec<usize> {
        self.owned
            .iter()
            .enumerate()
            .filter_map(|(id, &o)| o.then_some(id))
            .collect()
    }

    /// Number of owned ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.owned.iter().filter(|&&o| o).count()
    }

    /// Length of the global id space.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owned.len()
    }

    /// Whether the global id space is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_over_three() {
        let sizes: Vec<usize> = (0..3)
            .map(|w| split_range(0, 10, w, 3).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(split_range(0, 10, 0, 3).unwrap(), 0..4);
        assert_eq!(split_range(0, 10, 1, 3).unwrap(), 4..7);
        assert_eq!(split_range(0, 10, 2, 3).unwrap(), 7..10);
    }

    #[test]
    fn offset_begin() {
        assert_eq!(split_range(100, 107, 0, 2).unwrap(), 100..104);
        assert_eq!(split_range(100, 107, 1, 2).unwrap(), 104..107);
    }

    #[test]
    fn more_workers_than_items() {
        let p = PartitionAssignment::new(2, 4).unwrap();
        assert_eq!(p.sizes(), vec![1, 1, 0, 0]);
        assert_eq!(p.owner_of(1), Some(1));
    }

    #[test]
    fn empty_range_rejected() {
        assert!(matches!(
            split_range(5, 5, 0, 1),
            Err(OracleError::EmptyRange { .. })
        ));
        assert!(split_range(6, 5, 0, 1).is_err());
    }

    #[test]
    fn bad_worker_rejected() {
        assert!(matches!(
            split_range(0, 10, 3, 3),
            Err(OracleError::WorkerOutOfRange { .. })
        ));
        assert!(split_range(0, 10, 0, 0).is_err());
    }

    #[test]
    fn owner_of_matches_ranges() {
        let p = PartitionAssignment::new(1000, 7).unwrap();
        for id in 0..1000 {
            let rank = p.owner_of(id).unwrap();
            assert!(p.range(rank).unwrap().contains(&id));
        }
        assert_eq!(p.owner_of(1000), None);
    }

    #[test]
    fn mask_from_range() {
        let mut m = OwnershipMask::from_range(10, 4..7);
        assert_eq!(m.owned_ids(), vec![4, 5, 6]);
        assert_eq!(m.count(), 3);
        assert!(m.is_owned(5));
        assert!(!m.is_owned(7));
        assert!(!m.is_owned(99));
        m.clear();
        assert_eq!(m.count(), 0);
        m.set(9).unwrap();
        assert!(m.set(10).is_err());
        assert_eq!(m.owned_ids(), vec![9]);
    }
}
