// SPDX-License-Identifier: AGPL-3.0-only

//! Deterministic synthetic particle systems for validation runs.
//!
//! Positions and previous positions are uniform in `[0, cycle)³`, charges are
//! uniform in `[0, 1)` shifted to zero mean so the system is neutral, and
//! every particle takes category 0. Generated with the Knuth MMIX LCG.

use crate::error::Result;
use crate::particle::{Category, Particle, ParticleSet};

/// LCG multiplier (Knuth MMIX).
pub const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;

/// LCG increment (Knuth MMIX).
pub const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// `2⁵³`, for 53-bit uniform doubles.
pub const LCG_53_DIVISOR: f64 = (1u64 << 53) as f64;

/// Advance the generator one step.
pub fn lcg_step(seed: &mut u64) {
    *seed = seed.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT);
}

/// Uniform double in `[0, 1)`.
pub fn lcg_uniform_f64(seed: &mut u64) -> f64 {
    lcg_step(seed);
    (*seed >> 11) as f64 / LCG_53_DIVISOR
}

/// Neutral random system of `n` particles in a cell of edge `cycle`.
///
/// # Errors
///
/// [`crate::OracleError::CategoryOutOfRange`] when `num_types == 0`.
pub fn neutral_system(n: usize, num_types: usize, cycle: f64, seed: u64) -> Result<ParticleSet> {
    let mut s = seed;
    let mut particles: Vec<Particle> = (0..n)
        .map(|_| {
            let position = [
                lcg_uniform_f64(&mut s) * cycle,
                lcg_uniform_f64(&mut s) * cycle,
                lcg_uniform_f64(&mut s) * cycle,
            ];
            let previous_position = [
                lcg_uniform_f64(&mut s) * cycle,
                lcg_uniform_f64(&mut s) * cycle,
                lcg_uniform_f64(&mut s) * cycle,
            ];
            Particle {
                position,
                previous_position,
                charge: lcg_uniform_f64(&mut s),
                category: Category::new(0),
            }
        })
        .collect();
    if n > 0 {
        let mean = particles.iter().map(|p| p.charge).sum::<f64>() / n as f64;
        particles.iter_mut().for_each(|p| p.charge -= mean);
    }
    ParticleSet::new(particles, num_types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_in_unit_interval() {
        let mut seed = 12345u64;
        for _ in 0..1000 {
            let v = lcg_uniform_f64(&mut seed);
            assert!((0.0..1.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn system_is_neutral_and_inside_cell() {
        let ps = neutral_system(200, 1, 20.0, 42).unwrap();
        let q: f64 = ps.iter().map(|p| p.charge).sum();
        assert!(q.abs() < 1e-12);
        assert!(ps.iter().all(|p| p.position.iter().all(|&x| (0.0..20.0).contains(&x))));
    }

    #[test]
    fn deterministic_for_seed() {
        let a = neutral_system(10, 1, 5.0, 7).unwrap();
        let b = neutral_system(10, 1, 5.0, 7).unwrap();
        let c = neutral_system(10, 1, 5.0, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_types_rejected() {
        assert!(neutral_system(3, 0, 5.0, 1).is_err());
    }
}
