// SPDX-License-Identifier: AGPL-3.0-only

//! Per-category-pair scale factors for the switched pair kernel.
//!
//! Three `num_types × num_types` tables, row-major by ordered category pair
//! `(i, j)`:
//!
//! | Table | Symbol | Role |
//! |-------|--------|------|
//! | rescale | `rs` | multiplies `R²` before the inverse powers |
//! | energy scale | `gs` | multiplies the pair energy into the potential |
//! | force-energy scale | `fgs` | multiplies the force scalar into the force |
//!
//! With `fgs = -6·rs·gs` the accumulated force is exactly `-∇ᵢ potential_i`
//! (see [`ScaleTriple::consistent`]). Tables copied from the legacy driver set
//! `fgs = gs`, which keeps the direction but not the magnitude.

use crate::error::{OracleError, Result};
use crate::particle::Category;

/// Scale factors for one ordered category pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTriple {
    /// Multiplier applied to `R²`
    pub rescale: f64,
    /// Multiplier applied to the pair energy
    pub energy_scale: f64,
    /// Multiplier applied to the pair force scalar
    pub force_energy_scale: f64,
}

impl ScaleTriple {
    /// Triple whose force is the negative gradient of its energy.
    #[must_use]
    pub fn consistent(rescale: f64, energy_scale: f64) -> Self {
        Self {
            rescale,
            energy_scale,
            force_energy_scale: -6.0 * rescale * energy_scale,
        }
    }
}

/// `num_types × num_types` scale table.
#[derive(Debug, Clone)]
pub struct TypeScaleTable {
    num_types: usize,
    entries: Vec<ScaleTriple>,
}

impl TypeScaleTable {
    /// Table from three row-major `num_types²` arrays.
    ///
    /// # Errors
    ///
    /// [`OracleError::TableShape`] when any array has the wrong length or
    /// `num_types == 0`.
    pub fn new(
        num_types: usize,
        rescale: &[f64],
        energy_scale: &[f64],
        force_energy_scale: &[f64],
    ) -> Result<Self> {
        let expected = num_types * num_types;
        for (table, len) in [
            ("rescale", rescale.len()),
            ("energy_scale", energy_scale.len()),
            ("force_energy_scale", force_energy_scale.len()),
        ] {
            if len != expected || expected == 0 {
                return Err(OracleError::TableShape {
                    table,
                    len,
                    expected,
                });
            }
        }
        let entries = rescale
            .iter()
            .zip(energy_scale)
            .zip(force_energy_scale)
            .map(|((&rs, &gs), &fgs)| ScaleTriple {
                rescale: rs,
                energy_scale: gs,
                force_energy_scale: fgs,
            })
            .collect();
        Ok(Self { num_types, entries })
    }

    /// Every pair shares `triple`.
    ///
    /// # Errors
    ///
    /// [`OracleError::TableShape`] when `num_types == 0`.
    pub fn uniform(num_types: usize, triple: ScaleTriple) -> Result<Self> {
        if num_types == 0 {
            return Err(OracleError::TableShape {
                table: "uniform",
                len: 0,
                expected: 0,
            });
        }
        Ok(Self {
            num_types,
            entries: vec![triple; num_types * num_types],
        })
    }

    /// Number of categories.
    #[must_use]
    pub const fn num_types(&self) -> usize {
        self.num_types
    }

    /// Triple for ordered pair `(ci, cj)`.
    ///
    /// Categories are validated when the [`crate::particle::ParticleSet`] is
    /// built; out-of-range pairs return `None`.
    #[must_use]
    pub fn get(&self, ci: Category, cj: Category) -> Option<ScaleTriple> {
        let (i, j) = (ci.index(), cj.index());
        if i >= self.num_types || j >= self.num_types {
            return None;
        }
        self.entries.get(i * self.num_types + j).copied()
    }
}
