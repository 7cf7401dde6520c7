// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: distributed validation protocol.
//!
//! Runs the direct kernel and external-solver passes on in-process worker
//! groups and checks the cross-worker reductions: relative errors against a
//! serial reference, Coulomb scaling, dipole and count reduction, and the
//! reciprocal-space wave reduction.

use hotspring_direct::comm::{Communicator, LocalGroup, SerialComm};
use hotspring_direct::config::OracleConfig;
use hotspring_direct::kernel::SwitchedPairKernel;
use hotspring_direct::partition::OwnershipMask;
use hotspring_direct::particle::ParticleSet;
use hotspring_direct::periodic::PeriodicDomain;
use hotspring_direct::redistribute::{redistribute, Body, KeepOwner, SlabRouting};
use hotspring_direct::solver::{
    BodyOutput, CoulombPass, EwaldParams, EwaldPass, LongRangeParams, LongRangeSolver, LongRangeVanDerWaals,
    ReciprocalSpaceSolver, Wave, CELEC,
};
use hotspring_direct::type_table::TypeScaleTable;
use hotspring_direct::validation::{
    FieldProducer, FieldSet, PartialSums, ReferenceField, RelativeErrors, ValidationHarness,
};
use hotspring_direct::{synthetic, tolerances, Result};

fn small_config() -> OracleConfig {
    OracleConfig {
        n_global: 120,
        cycle: 24.0,
        ..OracleConfig::default()
    }
}

fn system(config: &OracleConfig) -> ParticleSet {
    synthetic::neutral_system(config.n_global, config.num_types, config.cycle, config.seed).expect("system")
}

fn serial_reference(config: &OracleConfig, particles: &ParticleSet) -> FieldSet {
    let mut kernel = config.direct_kernel().expect("kernel");
    ValidationHarness::new(&SerialComm)
        .evaluate(&mut kernel, particles, &OwnershipMask::all(particles.len()))
        .expect("serial evaluate")
}

#[test]
fn distributed_matches_serial_keep_owner() {
    let config = small_config();
    let particles = system(&config);
    let reference = serial_reference(&config, &particles);
    let domain = config.domain().expect("domain");

    let out = LocalGroup::new(3)
        .expect("group")
        .run(|comm| -> Result<RelativeErrors> {
            let mut local = particles.clone();
            let mut owned = OwnershipMask::for_rank(local.len(), comm.rank(), comm.size())?;
            redistribute(&comm, &mut local, &mut owned, &domain, &KeepOwner)?;
            let mut kernel = config.direct_kernel()?;
            let mut replay = ReferenceField::new(reference.clone());
            ValidationHarness::new(&comm).compare(&local, &owned, &mut kernel, &mut replay)
        })
        .expect("run");

    for e in out {
        let e = e.expect("rank result");
        assert!(e.pot_rel < tolerances::DISTRIBUTED_VS_SERIAL_REL, "potRel {}", e.pot_rel);
        assert!(e.acc_rel < tolerances::DISTRIBUTED_VS_SERIAL_REL, "accRel {}", e.acc_rel);
    }
}

#[test]
fn distributed_matches_serial_after_slab_exchange() {
    let config = small_config();
    let particles = system(&config);
    let reference = serial_reference(&config, &particles);
    let domain = config.domain().expect("domain");
    let serial_sum: f64 = reference.potential.iter().sum();

    let out = LocalGroup::new(4)
        .expect("group")
        .run(|comm| -> Result<(RelativeErrors, usize)> {
            let mut local = particles.clone();
            let mut owned = OwnershipMask::for_rank(local.len(), comm.rank(), comm.size())?;
            redistribute(&comm, &mut local, &mut owned, &domain, &SlabRouting::new(&domain))?;
            let mut kernel = config.direct_kernel()?;
            let mut replay = ReferenceField::new(reference.clone());
            let e = ValidationHarness::new(&comm).compare(&local, &owned, &mut kernel, &mut replay)?;
            Ok((e, owned.count()))
        })
        .expect("run");

    let results: Vec<(RelativeErrors, usize)> = out.into_iter().map(|r| r.expect("rank")).collect();
    let owned_total: usize = results.iter().map(|(_, n)| n).sum();
    assert_eq!(owned_total, config.n_global);
    let first = results[0].0;
    for (e, _) in &results {
        assert_eq!(e, &first, "every rank reduces identical sums");
    }
    assert!(first.pot_rel < tolerances::DISTRIBUTED_VS_SERIAL_REL);
    assert!(((first.sums.pot_sum_b - serial_sum) / serial_sum).abs() < tolerances::DISTRIBUTED_VS_SERIAL_REL);
}

#[test]
fn perturbed_producer_is_detected() {
    let config = small_config();
    let particles = system(&config);
    let reference = serial_reference(&config, &particles);
    let mut perturbed = reference.clone();
    perturbed.potential.iter_mut().for_each(|p| *p *= 1.01);
    perturbed.force.iter_mut().for_each(|f| f[0] *= 1.01);

    let owned = OwnershipMask::all(particles.len());
    let e = ValidationHarness::new(&SerialComm)
        .compare_fields(&owned, &perturbed, &reference)
        .expect("compare");
    assert!((e.pot_rel - 0.01).abs() < 1e-9);
    assert!(e.acc_rel > 0.0 && e.acc_rel < 0.01 + 1e-12);
}

/// Id-dependent force distortion, nonzero for every particle.
fn distortion(id: usize) -> f64 {
    1.0 + 1e-3 * (1 + id % 7) as f64
}

fn distort(field: &mut FieldSet, owned: &OwnershipMask) {
    for id in owned.owned_ids() {
        let k = distortion(id);
        field.potential[id] *= 1.01;
        field.force[id][0] *= k;
        field.force[id][1] += 1e-3 * k;
    }
}

/// Direct kernel whose output is distorted per particle.
struct DistortedKernel<P> {
    inner: P,
}

impl<P: FieldProducer> FieldProducer for DistortedKernel<P> {
    fn name(&self) -> &str {
        "distorted"
    }

    fn evaluate<C: Communicator>(
        &mut self,
        comm: &C,
        particles: &ParticleSet,
        owned: &OwnershipMask,
        field: &mut FieldSet,
    ) -> Result<()> {
        self.inner.evaluate(comm, particles, owned, field)?;
        distort(field, owned);
        Ok(())
    }
}

fn distributed_errors_match_serial(workers: usize, slab: bool) {
    let config = small_config();
    let particles = system(&config);
    let reference = serial_reference(&config, &particles);
    let domain = config.domain().expect("domain");

    let all = OwnershipMask::all(particles.len());
    let mut distorted = reference.clone();
    distort(&mut distorted, &all);
    let serial = ValidationHarness::new(&SerialComm)
        .compare_fields(&all, &distorted, &reference)
        .expect("serial compare");
    assert!((serial.pot_rel - 0.01).abs() < 1e-9);
    assert!(serial.acc_rel > 0.0);

    let out = LocalGroup::new(workers)
        .expect("group")
        .run(|comm| -> Result<(RelativeErrors, PartialSums)> {
            let mut local = particles.clone();
            let mut owned = OwnershipMask::for_rank(local.len(), comm.rank(), comm.size())?;
            if slab {
                redistribute(&comm, &mut local, &mut owned, &domain, &SlabRouting::new(&domain))?;
            } else {
                redistribute(&comm, &mut local, &mut owned, &domain, &KeepOwner)?;
            }
            let harness = ValidationHarness::new(&comm);
            let mut a = DistortedKernel {
                inner: config.direct_kernel()?,
            };
            let mut b = ReferenceField::new(reference.clone());
            let field_a = harness.evaluate(&mut a, &local, &owned)?;
            let field_b = harness.evaluate(&mut b, &local, &owned)?;
            let partial = PartialSums::accumulate(&owned, &field_a, &field_b)?;
            let e = harness.compare_fields(&owned, &field_a, &field_b)?;
            Ok((e, partial))
        })
        .expect("run");

    let rel = |x: f64, y: f64| ((x - y) / y).abs();
    for r in out {
        let (e, partial) = r.expect("rank result");
        if partial.acc_norm > 0.0 {
            assert!(partial.acc_diff > 0.0, "every non-empty rank contributes a force difference");
        }
        assert!(
            rel(e.pot_rel, serial.pot_rel) < tolerances::DISTRIBUTED_VS_SERIAL_REL,
            "potRel {} vs {}",
            e.pot_rel,
            serial.pot_rel
        );
        assert!(
            rel(e.acc_rel, serial.acc_rel) < tolerances::DISTRIBUTED_VS_SERIAL_REL,
            "accRel {} vs {}",
            e.acc_rel,
            serial.acc_rel
        );
        assert!(rel(e.sums.acc_diff, serial.sums.acc_diff) < tolerances::DISTRIBUTED_VS_SERIAL_REL);
        assert!(rel(e.sums.acc_norm, serial.sums.acc_norm) < tolerances::DISTRIBUTED_VS_SERIAL_REL);
    }
}

#[test]
fn distorted_producer_errors_match_serial_three_ranks() {
    distributed_errors_match_serial(3, false);
}

#[test]
fn distorted_producer_errors_match_serial_after_slab_exchange() {
    distributed_errors_match_serial(4, true);
}

// ═══════════════════════════════════════════════════════════════════
// Mock external solvers
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct RecordingSolver {
    dipole: Option<([f64; 3], usize)>,
}

impl LongRangeSolver for RecordingSolver {
    fn evaluate(&mut self, bodies: &[Body]) -> Result<Vec<BodyOutput>> {
        Ok(vec![[1.0, 0.5, 0.0, -0.5]; bodies.len()])
    }

    fn dipole_correction(
        &mut self,
        global_dipole: [f64; 3],
        global_count: usize,
        _bodies: &[Body],
        _out: &mut [BodyOutput],
    ) -> Result<()> {
        self.dipole = Some((global_dipole, global_count));
        Ok(())
    }

    fn ewald_real_part(&mut self, bodies: &[Body], _alpha: f64, _cutoff: f64) -> Result<Vec<BodyOutput>> {
        Ok(vec![[0.0; 4]; bodies.len()])
    }

    fn van_der_waals(
        &mut self,
        bodies: &[Body],
        _switch: &SwitchedPairKernel,
        _table: &TypeScaleTable,
    ) -> Result<Vec<BodyOutput>> {
        Ok(bodies.iter().map(|b| [b.index.id() as f64, 0.0, 0.0, 0.0]).collect())
    }
}

/// Wave 0 accumulates Σq in `real` and the body count in `imag`.
#[derive(Debug, Default)]
struct CountingWaves {
    reduced: Option<Wave>,
}

impl ReciprocalSpaceSolver for CountingWaves {
    fn init_waves(&mut self) -> Vec<Wave> {
        vec![
            Wave {
                k: [0, 0, 1],
                real: 0.0,
                imag: 0.0,
            },
            Wave {
                k: [0, 1, 0],
                real: 0.0,
                imag: 0.0,
            },
        ]
    }

    fn dft(&mut self, waves: &mut [Wave], bodies: &[Body]) -> Result<()> {
        for b in bodies {
            waves[0].real += b.charge;
            waves[0].imag += 1.0;
        }
        Ok(())
    }

    fn wave_part(&mut self, waves: &mut [Wave]) -> Result<()> {
        self.reduced = Some(waves[0]);
        Ok(())
    }

    fn idft(&mut self, waves: &[Wave], bodies: &[Body], out: &mut [BodyOutput]) -> Result<()> {
        for (_, o) in bodies.iter().zip(out.iter_mut()) {
            o[0] += waves[0].imag;
        }
        Ok(())
    }

    fn self_term(&mut self, _bodies: &[Body], out: &mut [BodyOutput]) -> Result<()> {
        for o in out.iter_mut() {
            o[0] -= 1.0;
        }
        Ok(())
    }
}

#[test]
fn coulomb_pass_scales_and_reduces_dipole() {
    let config = small_config();
    let particles = system(&config);
    let domain = config.domain().expect("domain");
    let params = LongRangeParams {
        images: 0,
        cycle: config.cycle,
    };

    let serial_dipole = particles.iter().fold([0.0; 3], |mut acc, p| {
        for d in 0..3 {
            acc[d] += p.charge * p.position[d];
        }
        acc
    });

    let out = LocalGroup::new(4)
        .expect("group")
        .run(|comm| -> Result<(FieldSet, OwnershipMask, Option<([f64; 3], usize)>)> {
            let owned = OwnershipMask::for_rank(particles.len(), comm.rank(), comm.size())?;
            let mut solver = RecordingSolver::default();
            let field = {
                let mut pass = CoulombPass::new(&mut solver, params, domain);
                ValidationHarness::new(&comm).evaluate(&mut pass, &particles, &owned)?
            };
            Ok((field, owned, solver.dipole))
        })
        .expect("run");

    for rank in out {
        let (field, owned, dipole) = rank.expect("rank");
        let (dipole, count) = dipole.expect("dipole correction called");
        assert_eq!(count, config.n_global);
        for d in 0..3 {
            assert!((dipole[d] - serial_dipole[d]).abs() < 1e-10);
        }
        for i in owned.owned_ids() {
            let q = particles.get(i).expect("particle").charge;
            assert!((field.potential[i] - q * CELEC).abs() < 1e-12);
            assert!((field.force[i][0] - 0.5 * q * CELEC).abs() < 1e-12);
            assert!((field.force[i][2] + 0.5 * q * CELEC).abs() < 1e-12);
        }
        for i in (0..particles.len()).filter(|&i| !owned.is_owned(i)) {
            assert_eq!(field.potential[i], 0.0);
        }
    }
}

#[test]
fn ewald_pass_sums_waves_across_workers() {
    let config = small_config();
    let particles = system(&config);
    let domain = PeriodicDomain::new(config.cycle).expect("domain");
    let params: EwaldParams = config.ewald_params();
    let n = config.n_global as f64;

    let out = LocalGroup::new(3)
        .expect("group")
        .run(|comm| -> Result<(FieldSet, OwnershipMask, Option<Wave>)> {
            let owned = OwnershipMask::for_rank(particles.len(), comm.rank(), comm.size())?;
            let mut long_range = RecordingSolver::default();
            let mut waves = CountingWaves::default();
            let field = {
                let mut pass = EwaldPass::new(&mut long_range, &mut waves, params, domain);
                ValidationHarness::new(&comm).evaluate(&mut pass, &particles, &owned)?
            };
            Ok((field, owned, waves.reduced))
        })
        .expect("run");

    for rank in out {
        let (field, owned, reduced) = rank.expect("rank");
        let w = reduced.expect("wave_part called");
        assert_eq!(w.imag, n);
        assert!(w.real.abs() < 1e-10, "neutral system, Σq = {}", w.real);
        for i in owned.owned_ids() {
            let q = particles.get(i).expect("particle").charge;
            let expected = q * CELEC * (n - 1.0);
            assert!((field.potential[i] - expected).abs() < 1e-9 * expected.abs().max(1.0));
        }
    }
}

#[test]
fn long_range_vdw_is_unscaled() {
    let config = small_config();
    let particles = system(&config);
    let domain = config.domain().expect("domain");
    let mut solver = RecordingSolver::default();
    let owned = OwnershipMask::all(particles.len());
    let field = {
        let mut pass = LongRangeVanDerWaals::new(
            &mut solver,
            SwitchedPairKernel::new(config.cuton, config.cutoff).expect("radii"),
            config.type_table().expect("table"),
            domain,
        );
        ValidationHarness::new(&SerialComm)
            .evaluate(&mut pass, &particles, &owned)
            .expect("evaluate")
    };
    for i in 0..particles.len() {
        assert_eq!(field.potential[i], i as f64);
    }
}

#[test]
fn passes_compare_through_harness() {
    let config = small_config();
    let particles = system(&config);
    let domain = config.domain().expect("domain");
    let owned = OwnershipMask::all(particles.len());
    let mut expected = FieldSet::zeroed(particles.len());
    for (i, p) in particles.iter().enumerate() {
        expected.potential[i] = p.charge * CELEC;
        expected.force[i] = [0.5 * p.charge * CELEC, 0.0, -0.5 * p.charge * CELEC];
    }
    let mut solver = RecordingSolver::default();
    let mut pass = CoulombPass::new(
        &mut solver,
        LongRangeParams {
            images: 6,
            cycle: config.cycle,
        },
        domain,
    );
    let mut replay = ReferenceField::new(expected);
    let e = ValidationHarness::new(&SerialComm)
        .compare(&particles, &owned, &mut pass, &mut replay)
        .expect("compare");
    // Σq = 0 for a neutral system, so potRel is measured against ~0
    assert!(e.acc_rel < 1e-14);
}
