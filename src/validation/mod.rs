// SPDX-License-Identifier: AGPL-3.0-only

//! Cross-producer validation over a distributed particle set.
//!
//! Two field producers (typically an accelerated solver and the direct pair
//! kernel) evaluate the same owned partition. Per-worker partial sums are
//! globally reduced and turned into two relative errors:
//!
//! ```text
//! potRel = sqrt((ΣpotA − ΣpotB)² / (ΣpotB)²)
//! accRel = sqrt(Σ|F_A − F_B|² / Σ|F_B|²)
//! ```
//!
//! `B` is the reference. Both producers must see identical ownership and
//! fold state; the harness does not check this.
//!
//! | Ratio | Result |
//! |-------|--------|
//! | `0 / 0` | 0 |
//! | `x / 0`, `x > 0` | ∞ |

mod report;

pub use report::{Check, ToleranceMode, ValidationReport};

use crate::comm::Communicator;
use crate::error::{OracleError, Result};
use crate::partition::OwnershipMask;
use crate::particle::ParticleSet;

/// Per-particle potential and force accumulators, indexed by global id.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSet {
    /// Potential per particle
    pub potential: Vec<f64>,
    /// Force per particle
    pub force: Vec<[f64; 3]>,
}

impl FieldSet {
    /// Zeroed accumulators for `n` particles.
    #[must_use]
    pub fn zeroed(n: usize) -> Self {
        Self {
            potential: vec![0.0; n],
            force: vec![[0.0; 3]; n],
        }
    }

    /// Reset every accumulator. Required between independent passes.
    pub fn zero(&mut self) {
        self.potential.iter_mut().for_each(|p| *p = 0.0);
        self.force.iter_mut().for_each(|f| *f = [0.0; 3]);
    }

    /// Number of particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.potential.len()
    }

    /// Whether there are no particles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.potential.is_empty()
    }

    /// Check that the accumulators cover `n` particles.
    ///
    /// # Errors
    ///
    /// [`OracleError::LengthMismatch`] otherwise.
    pub fn check_len(&self, n: usize) -> Result<()> {
        if self.potential.len() != n || self.force.len() != n {
            return Err(OracleError::LengthMismatch {
                context: "field set",
                left: self.potential.len().min(self.force.len()),
                right: n,
            });
        }
        Ok(())
    }
}

/// Anything that fills per-particle potential and force for owned particles.
///
/// Implementations add into `field` (`+=`); the caller zeroes it first.
pub trait FieldProducer {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Accumulate the field of every owned particle.
    ///
    /// # Errors
    ///
    /// Producer-specific failure.
    fn evaluate<C: Communicator>(
        &mut self,
        comm: &C,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        field: &mut FieldSet,
    ) -> Result<()>;
}

/// Producer that replays a previously computed field.
///
/// Lets a distributed run be compared against a serial reference computed
/// once up front.
#[derive(Debug, Clone)]
pub struct ReferenceField {
    field: FieldSet,
}

impl ReferenceField {
    /// Wrap a full-length field.
    #[must_use]
    pub const fn new(field: FieldSet) -> Self {
        Self { field }
    }

    /// The stored field.
    #[must_use]
    pub const fn field(&self) -> &FieldSet {
        &self.field
    }
}

impl FieldProducer for ReferenceField {
    fn name(&self) -> &str {
        "reference"
    }

    fn evaluate<C: Communicator>(
        &mut self,
        _comm: &C,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        field: &mut FieldSet,
    ) -> Result<()> {
        field.check_len(particles.len())?;
        self.field.check_len(particles.len())?;
        for i in owned.owned_ids() {
            field.potential[i] += self.field.potential[i];
            for d in 0..3 {
                field.force[i][d] += self.field.force[i][d];
            }
        }
        Ok(())
    }
}

/// Per-worker sums over owned particles, before reduction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialSums {
    /// Σ potential from producer A
    pub pot_sum_a: f64,
    /// Σ potential from producer B
    pub pot_sum_b: f64,
    /// Σ |F_A − F_B|²
    pub acc_diff: f64,
    /// Σ |F_B|²
    pub acc_norm: f64,
}

impl PartialSums {
    /// Accumulate over the owned particles of two fields.
    ///
    /// # Errors
    ///
    /// [`OracleError::LengthMismatch`] unless both fields cover the mask.
    pub fn accumulate(owned: &OwnershipMask, a: &FieldSet, b: &FieldSet) -> Result<Self> {
        a.check_len(owned.len())?;
        b.check_len(owned.len())?;
        let mut s = Self::default();
        for i in owned.owned_ids() {
            s.pot_sum_a += a.potential[i];
            s.pot_sum_b += b.potential[i];
            let (fa, fb) = (a.force[i], b.force[i]);
            for d in 0..3 {
                let diff = fa[d] - fb[d];
                s.acc_diff += diff * diff;
                s.acc_norm += fb[d] * fb[d];
            }
        }
        Ok(s)
    }

    /// Global sum across the group.
    ///
    /// # Errors
    ///
    /// Collective failure.
    pub fn reduce<C: Communicator>(&self, comm: &C) -> Result<Self> {
        let g = comm.all_reduce_sum(&[self.pot_sum_a, self.pot_sum_b, self.acc_diff, self.acc_norm])?;
        Ok(Self {
            pot_sum_a: g[0],
            pot_sum_b: g[1],
            acc_diff: g[2],
            acc_norm: g[3],
        })
    }
}

/// Relative errors of producer A against reference B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeErrors {
    /// Relative error of the summed potential
    pub pot_rel: f64,
    /// RMS relative error of the force field
    pub acc_rel: f64,
    /// The reduced sums the errors were derived from
    pub sums: PartialSums,
}

impl RelativeErrors {
    /// Errors from globally reduced sums.
    #[must_use]
    pub fn from_sums(sums: PartialSums) -> Self {
        let dp = sums.pot_sum_a - sums.pot_sum_b;
        Self {
            pot_rel: safe_ratio(dp * dp, sums.pot_sum_b * sums.pot_sum_b).sqrt(),
            acc_rel: safe_ratio(sums.acc_diff, sums.acc_norm).sqrt(),
            sums,
        }
    }
}

fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        if num == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        num / den
    }
}

/// Runs two producers over the same partition and compares them.
#[derive(Debug)]
pub struct ValidationHarness<'c, C: Communicator> {
    comm: &'c C,
}

impl<'c, C: Communicator> ValidationHarness<'c, C> {
    /// Harness bound to a communicator.
    #[must_use]
    pub const fn new(comm: &'c C) -> Self {
        Self { comm }
    }

    /// Zero a fresh field and fill it from `producer`.
    ///
    /// # Errors
    ///
    /// Producer failure.
    pub fn evaluate<P: FieldProducer>(
        &self,
        producer: &mut P,
        particles: &ParticleSet,
        owned: &OwnershipMask,
    ) -> Result<FieldSet> {
        let mut field = FieldSet::zeroed(particles.len());
        producer.evaluate(self.comm, particles, owned, &mut field)?;
        tracing::debug!(
            rank = self.comm.rank(),
            producer = producer.name(),
            "field evaluated"
        );
        Ok(field)
    }

    /// Evaluate `a` and reference `b`, reduce, and report relative errors.
    ///
    /// # Errors
    ///
    /// Producer or collective failure.
    pub fn compare<A: FieldProducer, B: FieldProducer>(
        &self,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        a: &mut A,
        b: &mut B,
    ) -> Result<RelativeErrors> {
        let field_a = self.evaluate(a, particles, owned)?;
        let field_b = self.evaluate(b, particles, owned)?;
        self.compare_fields(owned, &field_a, &field_b)
    }

    /// Reduce and compare two already evaluated fields.
    ///
    /// # Errors
    ///
    /// [`OracleError::LengthMismatch`] if either field does not cover the
    /// mask, or collective failure.
    pub fn compare_fields(
        &self,
        owned: &OwnershipMask,
        field_a: &FieldSet,
        field_b: &FieldSet,
    ) -> Result<RelativeErrors> {
        let local = PartialSums::accumulate(owned, field_a, field_b)?;
        let global = local.reduce(self.comm)?;
        let errors = RelativeErrors::from_sums(global);
        if self.comm.rank() == 0 {
            tracing::info!(
                pot_rel = errors.pot_rel,
                acc_rel = errors.acc_rel,
                "relative errors"
            );
        }
        Ok(errors)
    }
}
