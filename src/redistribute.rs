// SPDX-License-Identifier: AGPL-3.0-only

//! Particle redistribution between workers.
//!
//! 1. Owned particles are folded into the cell and packed as [`Body`]
//!    records carrying an [`EncodedIndex`] (id plus fold flags).
//! 2. A [`RoutingPolicy`] picks a destination rank per body.
//! 3. One all-to-all exchange moves the bodies.
//! 4. Receivers unfold positions from the flags, write them back into their
//!    replica and take ownership.
//!
//! Previous positions travel unchanged with the body.

use crate::comm::Communicator;
use crate::error::{OracleError, Result};
use crate::partition::OwnershipMask;
use crate::particle::{Category, ParticleSet};
use crate::periodic::{EncodedIndex, PeriodicDomain};

/// Transport record for one particle, position folded into the cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Global id plus fold flags
    pub index: EncodedIndex,
    /// Folded position
    pub position: [f64; 3],
    /// Previous position (not folded)
    pub previous_position: [f64; 3],
    /// Charge
    pub charge: f64,
    /// Type index
    pub category: Category,
}

/// Fold and pack every owned particle, in ascending id order.
///
/// # Errors
///
/// [`OracleError::IdOutOfRange`] when an owned id has no particle or does not
/// fit the packed index.
pub fn pack_bodies(
    particles: &ParticleSet,
    owned: &OwnershipMask,
    domain: &PeriodicDomain,
) -> Result<Vec<Body>> {
    owned
        .owned_ids()
        .into_iter()
        .map(|id| {
            let p = particles.get(id).ok_or(OracleError::IdOutOfRange(id))?;
            let (position, flags) = domain.wrap(p.position);
            Ok(Body {
                index: EncodedIndex::new(id, flags)?,
                position,
                previous_position: p.previous_position,
                charge: p.charge,
                category: p.category,
            })
        })
        .collect()
}

/// Chooses the destination rank of each body.
pub trait RoutingPolicy {
    /// Destination in `[0, workers)` for `body` currently on `source`.
    fn destination(&self, source: usize, body: &Body, workers: usize) -> usize;
}

/// Every body stays where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepOwner;

impl RoutingPolicy for KeepOwner {
    fn destination(&self, source: usize, _body: &Body, _workers: usize) -> usize {
        source
    }
}

/// Equal-width slabs along x of the folded cell.
#[derive(Debug, Clone, Copy)]
pub struct SlabRouting {
    cycle: f64,
}

impl SlabRouting {
    /// Slabs over a cell of edge `domain.cycle()`.
    #[must_use]
    pub const fn new(domain: &PeriodicDomain) -> Self {
        Self {
            cycle: domain.cycle(),
        }
    }
}

impl RoutingPolicy for SlabRouting {
    fn destination(&self, _source: usize, body: &Body, workers: usize) -> usize {
        let frac = (body.position[0] / self.cycle).clamp(0.0, 1.0);
        // truncation toward zero picks the slab; frac == 1 folds into the last
        ((frac * workers as f64) as usize).min(workers.saturating_sub(1))
    }
}

/// What one rank sent and received in a redistribution round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedistributionStats {
    /// Bodies that left this rank for another
    pub sent: usize,
    /// Bodies now owned by this rank
    pub received: usize,
    /// Received bodies that had at least one axis folded
    pub folded: usize,
}

/// Move owned particles according to `policy` and rebuild the ownership mask.
///
/// Collective: every rank must call it.
///
/// # Errors
///
/// [`OracleError::WorkerOutOfRange`] if the policy returns a bad rank,
/// [`OracleError::IdOutOfRange`] for ids outside the replica, or collective
/// failure.
pub fn redistribute<C: Communicator, P: RoutingPolicy>(
    comm: &C,
    particles: &mut ParticleSet,
    owned: &mut OwnershipMask,
    domain: &PeriodicDomain,
    policy: &P,
) -> Result<RedistributionStats> {
    let workers = comm.size();
    let rank = comm.rank();
    let bodies = pack_bodies(particles, owned, domain)?;

    let mut outgoing: Vec<Vec<Body>> = vec![Vec::new(); workers];
    let mut sent = 0;
    for body in bodies {
        let dst = policy.destination(rank, &body, workers);
        let bucket = outgoing
            .get_mut(dst)
            .ok_or(OracleError::WorkerOutOfRange { worker: dst, workers })?;
        if dst != rank {
            sent += 1;
        }
        bucket.push(body);
    }

    let incoming = comm.all_to_all(outgoing)?;

    owned.clear();
    let mut stats = RedistributionStats {
        sent,
        ..RedistributionStats::default()
    };
    for body in incoming.into_iter().flatten() {
        let id = body.index.id();
        let flags = body.index.flags();
        let p = particles.get_mut(id).ok_or(OracleError::IdOutOfRange(id))?;
        p.position = domain.unwrap(body.position, flags);
        p.previous_position = body.previous_position;
        p.charge = body.charge;
        p.category = body.category;
        owned.set(id)?;
        stats.received += 1;
        if !flags.is_empty() {
            stats.folded += 1;
        }
    }
    tracing::debug!(
        rank,
        sent = stats.sent,
        received = stats.received,
        folded = stats.folded,
        "redistributed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::particle::Particle;

    fn particles() -> ParticleSet {
        let ps = vec![
            Particle::new([1.0, 2.0, 3.0], 1.0, Category::new(0)),
            Particle::new([-1.0, 2.0, 11.0], -1.0, Category::new(1)),
            Particle::new([9.0, 9.0, 9.0], 0.5, Category::new(0)),
        ];
        ParticleSet::new(ps, 2).unwrap()
    }

    #[test]
    fn pack_folds_and_flags() {
        let d = PeriodicDomain::new(10.0).unwrap();
        let ps = particles();
        let bodies = pack_bodies(&ps, &OwnershipMask::all(3), &d).unwrap();
        assert_eq!(bodies.len(), 3);
        assert!(bodies[0].index.flags().is_empty());
        assert_eq!(bodies[1].index.flags().bits(), 0b101);
        assert!(d.contains(bodies[1].position));
        assert_eq!(bodies[1].index.id(), 1);
    }

    #[test]
    fn serial_round_trip_restores_positions() {
        let d = PeriodicDomain::new(10.0).unwrap();
        let mut ps = particles();
        let before = ps.clone();
        let mut owned = OwnershipMask::all(3);
        let stats = redistribute(&SerialComm, &mut ps, &mut owned, &d, &KeepOwner).unwrap();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.folded, 1);
        assert_eq!(owned.count(), 3);
        for (a, b) in ps.iter().zip(before.iter()) {
            for k in 0..3 {
                assert!((a.position[k] - b.position[k]).abs() < 1e-12);
            }
            assert_eq!(a.charge, b.charge);
        }
    }

    #[test]
    fn slab_routing_edges() {
        let d = PeriodicDomain::new(10.0).unwrap();
        let policy = SlabRouting::new(&d);
        let ps = particles();
        let bodies = pack_bodies(&ps, &OwnershipMask::all(3), &d).unwrap();
        assert_eq!(policy.destination(0, &bodies[0], 4), 0);
        // x = -1 folds to 9
        assert_eq!(policy.destination(0, &bodies[1], 4), 3);
        assert_eq!(policy.destination(0, &bodies[2], 1), 0);
    }

    struct Nowhere;

    impl RoutingPolicy for Nowhere {
        fn destination(&self, _source: usize, _body: &Body, workers: usize) -> usize {
            workers
        }
    }

    #[test]
    fn bad_destination_rejected() {
        let d = PeriodicDomain::new(10.0).unwrap();
        let mut ps = particles();
        let mut owned = OwnershipMask::all(3);
        assert!(matches!(
            redistribute(&SerialComm, &mut ps, &mut owned, &d, &Nowhere),
            Err(OracleError::WorkerOutOfRange { .. })
        ));
    }
}
