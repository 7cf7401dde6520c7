// SPDX-License-Identifier: AGPL-3.0-only

//! Direct van der Waals Validation: Switched Pair Kernel
//!
//! Validates the O(N²) direct-sum oracle before it is used as ground truth
//! for accelerated solvers.
//!
//! Tests:
//!   1. Two bodies at R = 1.5 against the closed form
//!   2. Potential and force continuity at `cuton`, vanishing at `cutoff`
//!   3. Distributed run (in-process workers, slab redistribution) against a
//!      serial reference: `potRel`, `accRel`
//!
//! **Provenance**: closed-form pair terms, see `provenance::TWO_BODY_ENERGY_R15`.
//!
//! Run: `cargo run --release --bin validate_direct_vdw -- --workers=4`

use hotspring_direct::comm::{Communicator, LocalGroup, SerialComm};
use hotspring_direct::config::OracleConfig;
use hotspring_direct::kernel::{DirectPairKernel, SwitchedPairKernel};
use hotspring_direct::partition::OwnershipMask;
use hotspring_direct::particle::{Category, Particle, ParticleSet};
use hotspring_direct::periodic::PeriodicDomain;
use hotspring_direct::redistribute::{redistribute, SlabRouting};
use hotspring_direct::type_table::{ScaleTriple, TypeScaleTable};
use hotspring_direct::validation::{ReferenceField, RelativeErrors, ValidationHarness, ValidationReport};
use hotspring_direct::{logging, provenance, synthetic, tolerances, Result};

use std::time::Instant;

fn main() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Direct van der Waals Validation: switched 12-6 oracle       ║");
    println!("║  two-body closed form, continuity, distributed vs serial     ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut report = ValidationReport::new("direct_vdw_validation");
    if let Err(e) = run(&mut report) {
        println!("  FATAL: {e}");
        report.check_bool("run completed", false);
    }
    report.finish();
}

fn run(report: &mut ValidationReport) -> Result<()> {
    let config = OracleConfig::from_args()?;
    config.validate()?;
    logging::init(config.verbose, 0);

    two_body(report)?;
    continuity(report, &config)?;
    distributed(report, &config)?;
    Ok(())
}

fn unit_triple() -> ScaleTriple {
    ScaleTriple {
        rescale: 1.0,
        energy_scale: 1.0,
        force_energy_scale: 1.0,
    }
}

fn two_body(report: &mut ValidationReport) -> Result<()> {
    println!("══════════════════════════════════════════════════════════════");
    println!("  TEST 1: two bodies, R = 1.5, cycle = 100, cuton/cutoff = 9.5/10");
    println!("══════════════════════════════════════════════════════════════");

    let table = TypeScaleTable::uniform(1, unit_triple())?;
    let domain = PeriodicDomain::new(100.0)?;
    let switch = SwitchedPairKernel::new(9.5, 10.0)?;
    let kernel = DirectPairKernel::new(switch, table, domain);
    let particles = ParticleSet::new(
        vec![
            Particle::new([1.0, 1.0, 1.0], 0.0, Category::new(0)),
            Particle::new([2.5, 1.0, 1.0], 0.0, Category::new(0)),
        ],
        1,
    )?;
    let (pot, force) = kernel.particle_field(&particles, 0)?;
    let e = provenance::TWO_BODY_ENERGY_R15.value;
    let f = provenance::TWO_BODY_FORCE_SCALAR_R15.value;
    println!("    potential_0 = {pot:.15e} (expected {e:.15e})");
    println!("    force_0     = [{:.6e}, {:.6e}, {:.6e}]", force[0], force[1], force[2]);

    report.check_rel("two-body potential", pot, e, tolerances::TWO_BODY_REL);
    // dX = x0 − x1 = −1.5, force −= dX·f
    report.check_rel("two-body force x", force[0], 1.5 * f, tolerances::TWO_BODY_REL);
    report.check_bool("two-body transverse force zero", force[1] == 0.0 && force[2] == 0.0);

    let coincident = ParticleSet::new(
        vec![
            Particle::new([3.0, 3.0, 3.0], 0.0, Category::new(0)),
            Particle::new([3.0, 3.0, 3.0], 0.0, Category::new(0)),
        ],
        1,
    )?;
    let (pot, force) = kernel.particle_field(&coincident, 0)?;
    report.check_bool("coincident pair contributes nothing", pot == 0.0 && force == [0.0; 3]);
    println!();
    Ok(())
}

fn continuity(report: &mut ValidationReport, config: &OracleConfig) -> Result<()> {
    println!("══════════════════════════════════════════════════════════════");
    println!(
        "  TEST 2: switching continuity, cuton = {}, cutoff = {}",
        config.cuton, config.cutoff
    );
    println!("══════════════════════════════════════════════════════════════");

    let switch = SwitchedPairKernel::new(config.cuton, config.cutoff)?;
    let triple = unit_triple();
    let eps = 1e-9;
    let terms = |r2: f64| switch.pair_terms(r2, triple);
    if let (Some(lo), Some(hi)) = (terms(switch.cuton2() - eps), terms(switch.cuton2() + eps)) {
        report.check_rel(
            "energy continuous at cuton",
            hi.energy,
            lo.energy,
            tolerances::KERNEL_CONTINUITY_REL,
        );
        report.check_rel(
            "force continuous at cuton",
            hi.force_scalar,
            lo.force_scalar,
            tolerances::KERNEL_CONTINUITY_REL,
        );
    } else {
        report.check_bool("pair terms defined around cuton", false);
    }
    match terms(switch.cutoff2() - 1e-10) {
        Some(edge) => {
            report.check_abs("energy vanishes at cutoff", edge.energy, 0.0, tolerances::CUTOFF_VANISH_ABS);
            report.check_abs(
                "force vanishes at cutoff",
                edge.force_scalar,
                0.0,
                tolerances::CUTOFF_VANISH_ABS,
            );
        }
        None => report.check_bool("pair terms defined inside cutoff", false),
    }
    report.check_bool("no contribution at cutoff", terms(switch.cutoff2()).is_none());
    println!();
    Ok(())
}

fn distributed(report: &mut ValidationReport, config: &OracleConfig) -> Result<()> {
    println!("══════════════════════════════════════════════════════════════");
    println!(
        "  TEST 3: distributed vs serial, N = {}, workers = {}",
        config.n_global, config.workers
    );
    println!("══════════════════════════════════════════════════════════════");

    let particles = synthetic::neutral_system(config.n_global, config.num_types, config.cycle, config.seed)?;
    let domain = config.domain()?;

    let t0 = Instant::now();
    let serial_comm = SerialComm;
    let serial = ValidationHarness::new(&serial_comm);
    let mut kernel = config.direct_kernel()?;
    let reference = serial.evaluate(&mut kernel, &particles, &OwnershipMask::all(particles.len()))?;
    println!("    serial reference: {:.2?}", t0.elapsed());

    let t1 = Instant::now();
    let group = LocalGroup::new(config.workers)?;
    let per_rank: Vec<Result<RelativeErrors>> = group.run(|comm| {
        let mut local = particles.clone();
        let mut owned = OwnershipMask::for_rank(local.len(), comm.rank(), comm.size())?;
        redistribute(&comm, &mut local, &mut owned, &domain, &SlabRouting::new(&domain))?;
        let mut kernel = config.direct_kernel()?;
        let mut replay = ReferenceField::new(reference.clone());
        ValidationHarness::new(&comm).compare(&local, &owned, &mut kernel, &mut replay)
    })?;
    println!("    distributed run: {:.2?}", t1.elapsed());

    let errors = per_rank.into_iter().collect::<Result<Vec<_>>>()?;
    let Some(first) = errors.first() else {
        report.check_bool("distributed run produced results", false);
        return Ok(());
    };
    println!("    potRel = {:.3e}, accRel = {:.3e}", first.pot_rel, first.acc_rel);
    report.check_relative_errors("distributed vs serial", first, tolerances::DISTRIBUTED_VS_SERIAL_REL);
    report.check_bool(
        "every rank reduced the same errors",
        errors.iter().all(|e| e == first),
    );
    let serial_pot: f64 = reference.potential.iter().sum();
    report.check_rel(
        "global potential sum",
        first.sums.pot_sum_a,
        serial_pot,
        tolerances::DISTRIBUTED_VS_SERIAL_REL,
    );
    println!();
    Ok(())
}
