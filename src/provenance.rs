// SPDX-License-Identifier: AGPL-3.0-only

//! Provenance for hardcoded reference values.
//!
//! Each constant a validation binary checks against traces back either to a
//! published constant or to a closed-form evaluation.
//!
//! ```text
//! source → derivation → Rust constant → validation check
//! ```

/// One reference value and where it came from.
#[derive(Debug, Clone)]
pub struct BaselineProvenance {
    /// Label used in validation output
    pub label: &'static str,
    /// Where the value originates
    pub source: &'static str,
    /// How it was derived
    pub derivation: &'static str,
    /// The value
    pub value: f64,
    /// Unit or description
    pub unit: &'static str,
}

/// Coulomb constant scaling every charged long-range output.
pub const COULOMB_CONSTANT: BaselineProvenance = BaselineProvenance {
    label: "Coulomb constant",
    source: "CHARMM force field unit system",
    derivation: "e²/(4πε₀) in kcal·Å/(mol·e²)",
    value: crate::solver::CELEC,
    unit: "kcal·Å/(mol·e²)",
};

/// Unswitched pair energy at R = 1.5, rs = 1: `u(u − 1)`, `u = 1.5⁻⁶`.
pub const TWO_BODY_ENERGY_R15: BaselineProvenance = BaselineProvenance {
    label: "two-body energy at R=1.5",
    source: "closed form",
    derivation: "u = 1/1.5^6 = 0.0877914951989026; u(u-1) = -0.0800841485696437",
    value: -0.080_084_148_569_643_66,
    unit: "reduced energy",
};

/// Unswitched force scalar at R = 1.5, rs = 1: `u(2u − 1)/R²`.
pub const TWO_BODY_FORCE_SCALAR_R15: BaselineProvenance = BaselineProvenance {
    label: "two-body force scalar at R=1.5",
    source: "closed form",
    derivation: "u(2u-1)/2.25 with u = 1/1.5^6",
    value: -0.032_167_467_529_059_88,
    unit: "reduced force / length",
};

/// Every baseline, for listing in binaries.
pub const ALL: &[BaselineProvenance] = &[COULOMB_CONSTANT, TWO_BODY_ENERGY_R15, TWO_BODY_FORCE_SCALAR_R15];
