// SPDX-License-Identifier: AGPL-3.0-only

//! In-process worker group: one OS thread per rank.
//!
//! Ranks exchange type-erased parcels through a shared `[src][dst]` mailbox.
//! Each exchange is two barrier phases: deposit, then collect. The second
//! barrier keeps a fast rank from depositing the next round's parcels before
//! every peer has emptied its column.

use super::{sum_in_rank_order, Communicator};
use crate::error::{OracleError, Result};

use std::any::Any;
use std::sync::{Arc, Barrier, Mutex};

type Parcel = Box<dyn Any + Send>;

struct Shared {
    size: usize,
    barrier: Barrier,
    mailbox: Mutex<Vec<Option<Parcel>>>,
}

/// Communicator handle for one rank of a [`LocalGroup`].
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.shared.size)
            .finish()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<()> {
        self.shared.barrier.wait();
        Ok(())
    }

    fn all_reduce_sum(&self, values: &[f64]) -> Result<Vec<f64>> {
        let outgoing = vec![values.to_vec(); self.size()];
        let received = self.all_to_all(outgoing)?;
        sum_in_rank_order(&received)
    }

    fn all_reduce_count(&self, count: usize) -> Result<usize> {
        let outgoing = vec![vec![count]; self.size()];
        let received = self.all_to_all(outgoing)?;
        Ok(received.iter().flatten().sum())
    }

    fn all_to_all<T: Send + 'static>(&self, outgoing: Vec<Vec<T>>) -> Result<Vec<Vec<T>>> {
        let size = self.size();
        if outgoing.len() != size {
            return Err(OracleError::LengthMismatch {
                context: "all_to_all",
                left: outgoing.len(),
                right: size,
            });
        }
        {
            let mut mailbox = self
                .shared
                .mailbox
                .lock()
                .map_err(|_| OracleError::CollectivePoisoned("all_to_all"))?;
            for (dst, parcel) in outgoing.into_iter().enumerate() {
                mailbox[self.rank * size + dst] = Some(Box::new(parcel));
            }
        }
        self.shared.barrier.wait();
        let received = {
            let mut mailbox = self
                .shared
                .mailbox
                .lock()
                .map_err(|_| OracleError::CollectivePoisoned("all_to_all"))?;
            (0..size)
                .map(|src| {
                    mailbox[src * size + self.rank]
                        .take()
                        .and_then(|p| p.downcast::<Vec<T>>().ok())
                        .map(|b| *b)
                        .ok_or(OracleError::MissingParcel {
                            op: "all_to_all",
                            from: src,
                        })
                })
                .collect::<Result<Vec<_>>>()
        };
        self.shared.barrier.wait();
        received
    }
}

/// Launcher for a fixed-size group of in-process workers.
#[derive(Debug, Clone, Copy)]
pub struct LocalGroup {
    size: usize,
}

impl LocalGroup {
    /// Group of `size` workers.
    ///
    /// # Errors
    ///
    /// [`OracleError::WorkerOutOfRange`] when `size == 0`.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(OracleError::WorkerOutOfRange {
                worker: 0,
                workers: 0,
            });
        }
        Ok(Self { size })
    }

    /// Number of workers.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Run `body` on every rank concurrently; results come back in rank order.
    ///
    /// # Errors
    ///
    /// [`OracleError::WorkerPanicked`] for the first rank whose thread panicked.
    pub fn run<F, R>(&self, body: F) -> Result<Vec<R>>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
    {
        let shared = Arc::new(Shared {
            size: self.size,
            barrier: Barrier::new(self.size),
            mailbox: Mutex::new((0..self.size * self.size).map(|_| None).collect()),
        });
        let body = &body;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.size)
                .map(|rank| {
                    let comm = LocalComm {
                        rank,
                        shared: Arc::clone(&shared),
                    };
                    scope.spawn(move || body(comm))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, h)| {
                    h.join().map_err(|_| {
                        tracing::error!(rank, "worker thread panicked");
                        OracleError::WorkerPanicked(rank)
                    })
                })
                .collect()
        })
    }
}
