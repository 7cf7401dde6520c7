// SPDX-License-Identifier: AGPL-3.0-only

//! Direct O(n_local × n_global) switched inverse-12/6 pair kernel.
//!
//! This is the ground-truth short-range producer: no cell list, no tree, no
//! cutoff acceleration. Every owned particle `i` visits every global `j`.
//!
//! # Pair terms
//!
//! With `R² = |dX|²` (minimum image), `R²s = rs·R²` and `u = (1/R²s)³`:
//!
//! | Region | energy | force scalar |
//! |--------|--------|--------------|
//! | `R² ≤ n²` | `u(u-1)` | `(1/R²s)·u(2u-1)` |
//! | `n² < R² < c²` | `u(u-1)·S` | `(1/R²s)·u(2u-1)·S - u(u-1)·S'/(3rs)` |
//! | `R² ≥ c²` | 0 | 0 |
//!
//! where `n = cuton`, `c = cutoff` and
//!
//! ```text
//! S(R²)  = (c²-R²)²(c²-3n²+2R²)/(c²-n²)³
//! S'(R²) = 6(c²-R²)(n²-R²)/(c²-n²)³
//! ```
//!
//! In both regions `force = -(dE/dR²)/(3rs)`, so potential and force are
//! continuous at `cuton` and vanish at `cutoff`.
//!
//! Accumulation: `potential_i += gs·energy`, `force_i -= dX·force·fgs`.
//! Coincident particles (`R² == 0`) contribute nothing.

use crate::comm::Communicator;
use crate::error::{OracleError, Result};
use crate::partition::OwnershipMask;
use crate::particle::ParticleSet;
use crate::periodic::PeriodicDomain;
use crate::type_table::{ScaleTriple, TypeScaleTable};
use crate::validation::{FieldProducer, FieldSet};

use rayon::prelude::*;

/// Energy and force scalar for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairTerms {
    /// Unscaled pair energy
    pub energy: f64,
    /// Unscaled force scalar (multiplies `dX`)
    pub force_scalar: f64,
}

/// Cutoff-switched inverse-12/6 interaction.
#[derive(Debug, Clone, Copy)]
pub struct SwitchedPairKernel {
    cuton2: f64,
    cutoff2: f64,
    inv_denom: f64,
}

impl SwitchedPairKernel {
    /// Kernel switching between `cuton` and `cutoff`.
    ///
    /// # Errors
    ///
    /// [`OracleError::InvalidCutoffs`] unless `0 < cuton < cutoff`, both finite.
    pub fn new(cuton: f64, cutoff: f64) -> Result<Self> {
        if !(cuton.is_finite() && cutoff.is_finite() && cuton > 0.0 && cuton < cutoff) {
            return Err(OracleError::InvalidCutoffs { cuton, cutoff });
        }
        let cuton2 = cuton * cuton;
        let cutoff2 = cutoff * cutoff;
        let d = cutoff2 - cuton2;
        Ok(Self {
            cuton2,
            cutoff2,
            inv_denom: 1.0 / (d * d * d),
        })
    }

    /// Inner radius squared.
    #[must_use]
    pub const fn cuton2(&self) -> f64 {
        self.cuton2
    }

    /// Outer radius squared.
    #[must_use]
    pub const fn cutoff2(&self) -> f64 {
        self.cutoff2
    }

    /// Switching function `S(R²)`; 1 inside `cuton`, 0 outside `cutoff`.
    #[must_use]
    pub fn switching(&self, r2: f64) -> f64 {
        if r2 <= self.cuton2 {
            1.0
        } else if r2 >= self.cutoff2 {
            0.0
        } else {
            let a = self.cutoff2 - r2;
            a * a * (self.cutoff2 - 3.0 * self.cuton2 + 2.0 * r2) * self.inv_denom
        }
    }

    /// `dS/dR²`; zero outside the switching shell.
    #[must_use]
    pub fn switching_derivative(&self, r2: f64) -> f64 {
        if r2 <= self.cuton2 || r2 >= self.cutoff2 {
            0.0
        } else {
            6.0 * (self.cutoff2 - r2) * (self.cuton2 - r2) * self.inv_denom
        }
    }

    /// Pair terms at squared distance `r2`, or `None` outside the cutoff or
    /// for coincident particles.
    #[must_use]
    pub fn pair_terms(&self, r2: f64, triple: ScaleTriple) -> Option<PairTerms> {
        if r2 >= self.cutoff2 || r2 == 0.0 {
            return None;
        }
        let inv_r2s = 1.0 / (r2 * triple.rescale);
        let u = inv_r2s * inv_r2s * inv_r2s;
        let e0 = u * (u - 1.0);
        let f0 = inv_r2s * u * (2.0 * u - 1.0);
        if r2 <= self.cuton2 {
            return Some(PairTerms {
                energy: e0,
                force_scalar: f0,
            });
        }
        let s = self.switching(r2);
        let ds = self.switching_derivative(r2);
        Some(PairTerms {
            energy: e0 * s,
            force_scalar: f0 * s - e0 * ds / (3.0 * triple.rescale),
        })
    }
}

/// Direct-sum producer over a periodic domain.
#[derive(Debug, Clone)]
pub struct DirectPairKernel {
    switch: SwitchedPairKernel,
    table: TypeScaleTable,
    domain: PeriodicDomain,
}

impl DirectPairKernel {
    /// Producer from its three parts.
    #[must_use]
    pub const fn new(switch: SwitchedPairKernel, table: TypeScaleTable, domain: PeriodicDomain) -> Self {
        Self {
            switch,
            table,
            domain,
        }
    }

    /// Switching parameters.
    #[must_use]
    pub const fn switch(&self) -> &SwitchedPairKernel {
        &self.switch
    }

    /// Scale table.
    #[must_use]
    pub const fn table(&self) -> &TypeScaleTable {
        &self.table
    }

    /// Periodic cell.
    #[must_use]
    pub const fn domain(&self) -> &PeriodicDomain {
        &self.domain
    }

    /// Potential and force on particle `i` from every other particle.
    ///
    /// # Errors
    ///
    /// [`OracleError::IdOutOfRange`] for an unknown id,
    /// [`OracleError::CategoryOutOfRange`] when a category is missing from
    /// the table.
    pub fn particle_field(&self, particles: &ParticleSet, i: usize) -> Result<(f64, [f64; 3])> {
        let pi = particles.get(i).ok_or(OracleError::IdOutOfRange(i))?;
        let mut pot = 0.0;
        let mut force = [0.0; 3];
        for pj in particles.iter() {
            let triple = self.table.get(pi.category, pj.category).ok_or(
                OracleError::CategoryOutOfRange {
                    category: pi.category.index().max(pj.category.index()),
                    num_types: self.table.num_types(),
                },
            )?;
            let dx = self.domain.minimum_image([
                pi.position[0] - pj.position[0],
                pi.position[1] - pj.position[1],
                pi.position[2] - pj.position[2],
            ]);
            let r2 = dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2];
            let Some(terms) = self.switch.pair_terms(r2, triple) else {
                continue;
            };
            pot += triple.energy_scale * terms.energy;
            let f = terms.force_scalar * triple.force_energy_scale;
            force[0] -= dx[0] * f;
            force[1] -= dx[1] * f;
            force[2] -= dx[2] * f;
        }
        Ok((pot, force))
    }
}

impl FieldProducer for DirectPairKernel {
    fn name(&self) -> &str {
        "direct_pair"
    }

    fn evaluate<C: Communicator>(
        &mut self,
        comm: &C,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        field: &mut FieldSet,
    ) -> Result<()> {
        field.check_len(particles.len())?;
        let ids = owned.owned_ids();
        tracing::debug!(
            rank = comm.rank(),
            n_local = ids.len(),
            n_global = particles.len(),
            "direct pair pass"
        );
        let contributions = ids
            .par_iter()
            .map(|&i| self.particle_field(particles, i).map(|(p, f)| (i, p, f)))
            .collect::<Result<Vec<_>>>()?;
        for (i, pot, force) in contributions {
            field.potential[i] += pot;
            for d in 0..3 {
                field.force[i][d] += force[d];
            }
        }
        Ok(())
    }
}
