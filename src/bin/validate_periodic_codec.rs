// SPDX-License-Identifier: AGPL-3.0-only

//! Periodic Codec Validation: partition, fold, pack, redistribute
//!
//! Tests:
//!   1. `split_range` tiles `[0, N)` exactly once with sizes differing by ≤ 1
//!   2. `{id, flags}` survives the 32-bit packing
//!   3. wrap → unwrap restores positions within one cycle of the cell
//!   4. slab redistribution over in-process workers preserves every particle
//!
//! Run: `cargo run --release --bin validate_periodic_codec -- --workers=4`

use hotspring_direct::comm::{Communicator, LocalGroup};
use hotspring_direct::config::OracleConfig;
use hotspring_direct::partition::{split_range, OwnershipMask, PartitionAssignment};
use hotspring_direct::particle::{Particle, ParticleSet};
use hotspring_direct::periodic::{EncodedIndex, PeriodicDomain, WrapFlags, MAX_ID};
use hotspring_direct::redistribute::{redistribute, RedistributionStats, SlabRouting};
use hotspring_direct::synthetic::lcg_uniform_f64;
use hotspring_direct::validation::ValidationReport;
use hotspring_direct::{logging, synthetic, tolerances, Result};

fn main() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Periodic Codec Validation: partition, fold, pack, exchange  ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut report = ValidationReport::new("periodic_codec_validation");
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

    partition_tiling(report)?;
    index_packing(report)?;
    wrap_round_trip(report, &config)?;
    exchange_round_trip(report, &config)?;
    Ok(())
}

fn partition_tiling(report: &mut ValidationReport) -> Result<()> {
    println!("  TEST 1: partition tiling");
    let known = split_range(0, 10, 0, 3)?;
    report.check_bool("S=10, P=3 first share is 0..4", known == (0..4));

    let mut all_ok = true;
    for n in [1usize, 2, 7, 10, 64, 1000, 1001] {
        for p in [1usize, 2, 3, 4, 8, 13] {
            let part = PartitionAssignment::new(n, p)?;
            let sizes = part.sizes();
            let max = sizes.iter().copied().max().unwrap_or(0);
            let min = sizes.iter().copied().min().unwrap_or(0);
            let mut next = 0;
            for rank in 0..p {
                let Some(r) = part.range(rank) else {
                    all_ok = false;
                    continue;
                };
                all_ok &= r.start == next;
                next = r.end;
            }
            all_ok &= next == n && sizes.iter().sum::<usize>() == n && max - min <= 1;
        }
    }
    report.check_bool("shares contiguous, complete, balanced", all_ok);
    println!();
    Ok(())
}

fn index_packing(report: &mut ValidationReport) -> Result<()> {
    println!("  TEST 2: {{id, flags}} packing");
    let mut ok = true;
    for id in [0usize, 1, 12345, 1 << 20, MAX_ID] {
        for bits in 0..8 {
            let idx = EncodedIndex::new(id, WrapFlags::from_bits(bits)?)?;
            let back = EncodedIndex::from_bits(idx.to_bits());
            ok &= back.id() == id && back.flags().bits() == bits;
        }
    }
    report.check_bool("pack/unpack exact for all flag values", ok);
    report.check_bool("id 2^29 rejected", EncodedIndex::new(MAX_ID + 1, WrapFlags::EMPTY).is_err());
    report.check_bool("flags 8 rejected", WrapFlags::from_bits(8).is_err());
    println!();
    Ok(())
}

fn wrap_round_trip(report: &mut ValidationReport, config: &OracleConfig) -> Result<()> {
    println!("  TEST 3: wrap/unwrap, cycle = {:.6}", config.cycle);
    let domain = config.domain()?;
    let c = domain.cycle();
    let mut seed = config.seed;
    let mut max_err: f64 = 0.0;
    let mut all_inside = true;
    for _ in 0..10_000 {
        let p = [
            lcg_uniform_f64(&mut seed).mul_add(2.0 * c, -0.5 * c),
            lcg_uniform_f64(&mut seed).mul_add(2.0 * c, -0.5 * c),
            lcg_uniform_f64(&mut seed).mul_add(2.0 * c, -0.5 * c),
        ];
        let (w, flags) = domain.wrap(p);
        all_inside &= domain.contains(w);
        let u = domain.unwrap(w, flags);
        for d in 0..3 {
            max_err = max_err.max((u[d] - p[d]).abs());
        }
    }
    println!("    max |unwrap(wrap(p)) − p| = {max_err:.3e}");
    report.check_bool("wrapped positions inside cell", all_inside);
    report.check_upper("wrap round trip", max_err, tolerances::WRAP_ROUND_TRIP_ABS);
    println!();
    Ok(())
}

fn shifted_system(config: &OracleConfig) -> Result<ParticleSet> {
    let base = synthetic::neutral_system(config.n_global, config.num_types, config.cycle, config.seed)?;
    let c = config.cycle;
    // move every third particle one half-cycle below the cell on x
    let particles: Vec<Particle> = base
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut p = p.clone();
            if i % 3 == 0 {
                p.position[0] -= 0.5 * c;
            }
            p
        })
        .collect();
    ParticleSet::new(particles, config.num_types)
}

fn exchange_round_trip(report: &mut ValidationReport, config: &OracleConfig) -> Result<()> {
    println!("  TEST 4: slab redistribution, workers = {}", config.workers);
    let particles = shifted_system(config)?;
    let domain: PeriodicDomain = config.domain()?;
    let group = LocalGroup::new(config.workers)?;
    let results: Vec<Result<(RedistributionStats, Vec<usize>, f64)>> = group.run(|comm| {
        let mut local = particles.clone();
        let mut owned = OwnershipMask::for_rank(local.len(), comm.rank(), comm.size())?;
        let stats = redistribute(&comm, &mut local, &mut owned, &domain, &SlabRouting::new(&domain))?;
        let ids = owned.owned_ids();
        let max_err = ids
            .iter()
            .filter_map(|&id| Some((local.get(id)?, particles.get(id)?)))
            .flat_map(|(a, b)| (0..3).map(move |d| (a.position[d] - b.position[d]).abs()))
            .fold(0.0, f64::max);
        Ok((stats, ids, max_err))
    })?;
    let results = results.into_iter().collect::<Result<Vec<_>>>()?;

    let mut seen = vec![0u32; particles.len()];
    let mut max_err: f64 = 0.0;
    let mut folded = 0;
    for (stats, ids, err) in &results {
        for &id in ids {
            if let Some(s) = seen.get_mut(id) {
                *s += 1;
            }
        }
        max_err = max_err.max(*err);
        folded += stats.folded;
    }
    println!("    folded bodies: {folded}, max position error: {max_err:.3e}");
    report.check_bool("every particle owned exactly once", seen.iter().all(|&s| s == 1));
    report.check_bool("shifted particles were folded", folded > 0);
    report.check_upper("positions restored after exchange", max_err, tolerances::WRAP_ROUND_TRIP_ABS);
    println!();
    Ok(())
}
