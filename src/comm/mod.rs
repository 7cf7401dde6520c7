// SPDX-License-Identifier: AGPL-3.0-only

//! Blocking collectives over a fixed-size worker group.
//!
//! All inter-worker coordination goes through [`Communicator`]: an
//! all-to-all exchange (redistribution), global sums (validation scalars,
//! dipole, particle count), and a barrier. Every rank must enter every
//! collective in the same order. There are no timeouts: a worker that never
//! reaches a collective stalls the whole group.
//!
//! | Implementation | Ranks | Use |
//! |----------------|-------|-----|
//! | [`SerialComm`] | 1 | reference runs, unit tests |
//! | [`LocalComm`] | N threads | in-process distributed runs |

mod local;

pub use local::{LocalComm, LocalGroup};

use crate::error::{OracleError, Result};

/// Blocking collective operations for one rank of a worker group.
pub trait Communicator {
    /// This worker's rank in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Block until every rank arrives.
    ///
    /// # Errors
    ///
    /// Fails if the shared state was poisoned by a panicking peer.
    fn barrier(&self) -> Result<()>;

    /// Element-wise global sum. Every rank receives the same bits.
    ///
    /// # Errors
    ///
    /// [`OracleError::LengthMismatch`] if ranks contribute different lengths.
    fn all_reduce_sum(&self, values: &[f64]) -> Result<Vec<f64>>;

    /// Global sum of a count.
    ///
    /// # Errors
    ///
    /// Collective failure.
    fn all_reduce_count(&self, count: usize) -> Result<usize>;

    /// Send `outgoing[dst]` to rank `dst`; returns the parcels received,
    /// indexed by source rank.
    ///
    /// # Errors
    ///
    /// [`OracleError::LengthMismatch`] unless `outgoing.len() == size()`.
    fn all_to_all<T: Send + 'static>(&self, outgoing: Vec<Vec<T>>) -> Result<Vec<Vec<T>>>;
}

/// Single-worker group; every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }

    fn all_reduce_sum(&self, values: &[f64]) -> Result<Vec<f64>> {
        Ok(values.to_vec())
    }

    fn all_reduce_count(&self, count: usize) -> Result<usize> {
        Ok(count)
    }

    fn all_to_all<T: Send + 'static>(&self, outgoing: Vec<Vec<T>>) -> Result<Vec<Vec<T>>> {
        if outgoing.len() != 1 {
            return Err(OracleError::LengthMismatch {
                context: "all_to_all",
                left: outgoing.len(),
                right: 1,
            });
        }
        Ok(outgoing)
    }
}

/// Sum equally sized contributions in source-rank order.
pub(crate) fn sum_in_rank_order(received: &[Vec<f64>]) -> Result<Vec<f64>> {
    let Some(first) = received.first() else {
        return Ok(Vec::new());
    };
    let mut out = vec![0.0; first.len()];
    for part in received {
        if part.len() != out.len() {
            return Err(OracleError::LengthMismatch {
                context: "all_reduce_sum",
                left: part.len(),
                right: out.len(),
            });
        }
        for (o, v) in out.iter_mut().zip(part) {
            *o += v;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_is_identity() {
        let c = SerialComm;
        assert_eq!(c.rank(), 0);
        assert_eq!(c.size(), 1);
        assert_eq!(c.all_reduce_sum(&[1.0, 2.0]).unwrap(), vec![1.0, 2.0]);
        assert_eq!(c.all_reduce_count(7).unwrap(), 7);
        let back = c.all_to_all(vec![vec![1u8, 2]]).unwrap();
        assert_eq!(back, vec![vec![1u8, 2]]);
    }

    #[test]
    fn serial_rejects_wrong_fanout() {
        assert!(SerialComm.all_to_all(vec![vec![1u8], vec![2u8]]).is_err());
    }

    #[test]
    fn rank_order_sum_checks_lengths() {
        let s = sum_in_rank_order(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(s, vec![4.0, 6.0]);
        assert!(sum_in_rank_order(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(sum_in_rank_order(&[]).unwrap().is_empty());
    }
}
