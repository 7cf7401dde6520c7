// SPDX-License-Identifier: AGPL-3.0-only

//! Contracts for external long-range and reciprocal-space solvers, and the
//! passes that drive them as [`FieldProducer`]s.
//!
//! The solvers themselves (tree build, multipole expansion, wave sums) live
//! outside this crate. Each pass packs the owned particles as [`Body`]
//! records, hands them to the solver, applies the global reductions the
//! solver needs, and scatters the per-body `[potential, fx, fy, fz]` output
//! back into the field by global id.
//!
//! | Pass | Solver calls | Reductions | Output scale |
//! |------|--------------|------------|--------------|
//! | [`CoulombPass`] | `evaluate`, `dipole_correction` | dipole, count | `q·CELEC` |
//! | [`EwaldPass`] | `ewald_real_part`, `init_waves`, `dft`, `wave_part`, `idft`, `self_term` | waves | `q·CELEC` |
//! | [`LongRangeVanDerWaals`] | `van_der_waals` | none | 1 |
//!
//! Passes borrow their solver handles mutably for the duration of the pass;
//! the owner releases them by dropping.

use crate::comm::Communicator;
use crate::error::{OracleError, Result};
use crate::kernel::SwitchedPairKernel;
use crate::partition::OwnershipMask;
use crate::particle::ParticleSet;
use crate::periodic::PeriodicDomain;
use crate::redistribute::{pack_bodies, Body};
use crate::type_table::TypeScaleTable;
use crate::validation::{FieldProducer, FieldSet};

use serde::{Deserialize, Serialize};

/// Coulomb constant in kcal·Å/(mol·e²).
pub const CELEC: f64 = 332.0716;

/// Bodies per leaf cell used to size the long-range tree.
pub const NCRIT: usize = 32;

/// Per-body solver output: potential then the three force components.
pub type BodyOutput = [f64; 4];

/// One reciprocal-space wave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Integer wave vector
    pub k: [i32; 3],
    /// Real part of the structure factor
    pub real: f64,
    /// Imaginary part of the structure factor
    pub imag: f64,
}

/// Long-range solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongRangeParams {
    /// Periodic image shells (0 disables periodicity)
    pub images: usize,
    /// Cell edge
    pub cycle: f64,
}

impl LongRangeParams {
    /// Tree depth for `n_local` bodies per worker:
    /// `1 + ⌊log₂(n_local / NCRIT) / 3⌋` once there are `NCRIT` bodies, else 0.
    #[must_use]
    pub fn tree_depth(n_local: usize) -> usize {
        if n_local < NCRIT {
            return 0;
        }
        let ratio = n_local as f64 / NCRIT as f64;
        1 + (ratio.log2() / 3.0) as usize
    }

    /// Whether a periodic run on `workers` ranks has a cubic rank layout.
    ///
    /// The periodic tree partition assumes a power-of-8 worker count; other
    /// counts still run.
    #[must_use]
    pub fn check_worker_layout(&self, workers: usize) -> bool {
        self.images == 0 || workers == 0 || workers.ilog2() % 3 == 0
    }

    /// Warn about a non-cubic layout, from rank 0 only. Returns whether a
    /// warning was logged.
    pub fn warn_worker_layout(&self, rank: usize, workers: usize) -> bool {
        if rank != 0 || self.check_worker_layout(workers) {
            return false;
        }
        tracing::warn!(
            workers,
            images = self.images,
            "periodic long-range run with a worker count that is not a power of 8"
        );
        true
    }
}

/// Ewald summation settings for the reciprocal-space solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EwaldParams {
    /// Waves per axis
    pub ksize: usize,
    /// Splitting parameter
    pub alpha: f64,
    /// Gaussian width for the self term
    pub sigma: f64,
    /// Real-space cutoff
    pub cutoff: f64,
    /// Cell edge
    pub cycle: f64,
}

/// Hierarchical long-range solver, consumed as a black box.
pub trait LongRangeSolver {
    /// Potential and force for each body of the local batch.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn evaluate(&mut self, bodies: &[Body]) -> Result<Vec<BodyOutput>>;

    /// Apply the periodic dipole correction from the global dipole and
    /// global body count.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn dipole_correction(
        &mut self,
        global_dipole: [f64; 3],
        global_count: usize,
        bodies: &[Body],
        out: &mut [BodyOutput],
    ) -> Result<()>;

    /// Ewald real-space contribution.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn ewald_real_part(&mut self, bodies: &[Body], alpha: f64, cutoff: f64) -> Result<Vec<BodyOutput>>;

    /// Switched van der Waals evaluated by the solver's own traversal.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn van_der_waals(
        &mut self,
        bodies: &[Body],
        switch: &SwitchedPairKernel,
        table: &TypeScaleTable,
    ) -> Result<Vec<BodyOutput>>;
}

/// Reciprocal-space Ewald solver, consumed as a black box.
pub trait ReciprocalSpaceSolver {
    /// Wave vectors for the configured `ksize`, zeroed.
    fn init_waves(&mut self) -> Vec<Wave>;

    /// Local structure factors into `waves`.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn dft(&mut self, waves: &mut [Wave], bodies: &[Body]) -> Result<()>;

    /// Turn globally summed structure factors into wave coefficients.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn wave_part(&mut self, waves: &mut [Wave]) -> Result<()>;

    /// Add the wave field at each body into `out`.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn idft(&mut self, waves: &[Wave], bodies: &[Body], out: &mut [BodyOutput]) -> Result<()>;

    /// Subtract the Gaussian self interaction.
    ///
    /// # Errors
    ///
    /// Solver-specific failure.
    fn self_term(&mut self, bodies: &[Body], out: &mut [BodyOutput]) -> Result<()>;
}

fn check_output(context: &'static str, bodies: &[Body], out: &[BodyOutput]) -> Result<()> {
    if bodies.len() == out.len() {
        Ok(())
    } else {
        Err(OracleError::LengthMismatch {
            context,
            left: out.len(),
            right: bodies.len(),
        })
    }
}

/// Add per-body outputs into `field`, scaling by `q·CELEC` when `charged`.
fn scatter(bodies: &[Body], out: &[BodyOutput], charged: bool, field: &mut FieldSet) -> Result<()> {
    for (body, o) in bodies.iter().zip(out) {
        let id = body.index.id();
        let scale = if charged { body.charge * CELEC } else { 1.0 };
        let pot = field
            .potential
            .get_mut(id)
            .ok_or(OracleError::IdOutOfRange(id))?;
        *pot += o[0] * scale;
        let f = field.force.get_mut(id).ok_or(OracleError::IdOutOfRange(id))?;
        f[0] += o[1] * scale;
        f[1] += o[2] * scale;
        f[2] += o[3] * scale;
    }
    Ok(())
}

/// Σ q·x over bodies (folded positions).
#[must_use]
pub fn local_dipole(bodies: &[Body]) -> [f64; 3] {
    bodies.iter().fold([0.0; 3], |mut acc, b| {
        for d in 0..3 {
            acc[d] += b.charge * b.position[d];
        }
        acc
    })
}

/// Long-range Coulomb through an external solver, with dipole correction.
#[derive(Debug)]
pub struct CoulombPass<'s, S: LongRangeSolver> {
    solver: &'s mut S,
    params: LongRangeParams,
    domain: PeriodicDomain,
}

impl<'s, S: LongRangeSolver> CoulombPass<'s, S> {
    /// Pass borrowing `solver`.
    pub fn new(solver: &'s mut S, params: LongRangeParams, domain: PeriodicDomain) -> Self {
        Self {
            solver,
            params,
            domain,
        }
    }
}

impl<S: LongRangeSolver> FieldProducer for CoulombPass<'_, S> {
    fn name(&self) -> &str {
        "long_range_coulomb"
    }

    fn evaluate<C: Communicator>(
        &mut self,
        comm: &C,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        field: &mut FieldSet,
    ) -> Result<()> {
        field.check_len(particles.len())?;
        let bodies = pack_bodies(particles, owned, &self.domain)?;
        self.params.warn_worker_layout(comm.rank(), comm.size());
        tracing::debug!(
            rank = comm.rank(),
            n_local = bodies.len(),
            depth = LongRangeParams::tree_depth(bodies.len()),
            images = self.params.images,
            "long-range coulomb"
        );
        let mut out = self.solver.evaluate(&bodies)?;
        check_output("long-range evaluate", &bodies, &out)?;
        let dipole = comm.all_reduce_sum(&local_dipole(&bodies))?;
        let count = comm.all_reduce_count(bodies.len())?;
        self.solver
            .dipole_correction([dipole[0], dipole[1], dipole[2]], count, &bodies, &mut out)?;
        scatter(&bodies, &out, true, field)
    }
}

/// Ewald summation: real part from the long-range solver, waves from the
/// reciprocal-space solver.
#[derive(Debug)]
pub struct EwaldPass<'s, L: LongRangeSolver, R: ReciprocalSpaceSolver> {
    long_range: &'s mut L,
    reciprocal: &'s mut R,
    params: EwaldParams,
    domain: PeriodicDomain,
}

impl<'s, L: LongRangeSolver, R: ReciprocalSpaceSolver> EwaldPass<'s, L, R> {
    /// Pass borrowing both solvers.
    pub fn new(long_range: &'s mut L, reciprocal: &'s mut R, params: EwaldParams, domain: PeriodicDomain) -> Self {
        Self {
            long_range,
            reciprocal,
            params,
            domain,
        }
    }
}

impl<L: LongRangeSolver, R: ReciprocalSpaceSolver> FieldProducer for EwaldPass<'_, L, R> {
    fn name(&self) -> &str {
        "ewald"
    }

    fn evaluate<C: Communicator>(
        &mut self,
        comm: &C,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        field: &mut FieldSet,
    ) -> Result<()> {
        field.check_len(particles.len())?;
        let bodies = pack_bodies(particles, owned, &self.domain)?;
        let mut out = self
            .long_range
            .ewald_real_part(&bodies, self.params.alpha, self.params.cutoff)?;
        check_output("ewald real part", &bodies, &out)?;

        let mut waves = self.reciprocal.init_waves();
        self.reciprocal.dft(&mut waves, &bodies)?;
        let flat: Vec<f64> = waves.iter().flat_map(|w| [w.real, w.imag]).collect();
        let summed = comm.all_reduce_sum(&flat)?;
        for (w, pair) in waves.iter_mut().zip(summed.chunks_exact(2)) {
            w.real = pair[0];
            w.imag = pair[1];
        }
        tracing::debug!(rank = comm.rank(), waves = waves.len(), ksize = self.params.ksize, "ewald waves reduced");
        self.reciprocal.wave_part(&mut waves)?;
        self.reciprocal.idft(&waves, &bodies, &mut out)?;
        self.reciprocal.self_term(&bodies, &mut out)?;
        scatter(&bodies, &out, true, field)
    }
}

/// Switched van der Waals through the long-range solver's traversal.
#[derive(Debug)]
pub struct LongRangeVanDerWaals<'s, S: LongRangeSolver> {
    solver: &'s mut S,
    switch: SwitchedPairKernel,
    table: TypeScaleTable,
    domain: PeriodicDomain,
}

impl<'s, S: LongRangeSolver> LongRangeVanDerWaals<'s, S> {
    /// Pass borrowing `solver`.
    pub fn new(solver: &'s mut S, switch: SwitchedPairKernel, table: TypeScaleTable, domain: PeriodicDomain) -> Self {
        Self {
            solver,
            switch,
            table,
            domain,
        }
    }
}

impl<S: LongRangeSolver> FieldProducer for LongRangeVanDerWaals<'_, S> {
    fn name(&self) -> &str {
        "long_range_vdw"
    }

    fn evaluate<C: Communicator>(
        &mut self,
        comm: &C,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        field: &mut FieldSet,
    ) -> Result<()> {
        field.check_len(particles.len())?;
        let bodies = pack_bodies(particles, owned, &self.domain)?;
        tracing::debug!(rank = comm.rank(), n_local = bodies.len(), "long-range vdw");
        let out = self.solver.van_der_waals(&bodies, &self.switch, &self.table)?;
        check_output("long-range vdw", &bodies, &out)?;
        scatter(&bodies, &out, false, field)
    }
}
