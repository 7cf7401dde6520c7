// SPDX-License-Identifier: AGPL-3.0-only

//! Validation tolerances with their numerical basis.
//!
//! Every threshold used by the validation binaries and integration tests is
//! defined here. No ad-hoc magic numbers.
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Exact arithmetic | IEEE 754 f64 | hand-computed two-body energy |
//! | Summation order | reduction ordering | distributed vs serial sums |
//! | Finite difference | O(h²) truncation | force vs energy gradient |

// ═══════════════════════════════════════════════════════════════════
// Machine precision
// ═══════════════════════════════════════════════════════════════════

/// Closed-form pair terms against the kernel.
///
/// The two-body check evaluates the same expression in a different order;
/// a handful of ulps of an O(1e-2) value.
pub const TWO_BODY_REL: f64 = 1e-12;

/// Wrap followed by unwrap, absolute per coordinate.
///
/// One add and one subtract of `cycle` (≤ ~100) lose at most a few ulps
/// of 100, i.e. ~1e-14.
pub const WRAP_ROUND_TRIP_ABS: f64 = 1e-12;

// ═══════════════════════════════════════════════════════════════════
// Summation order
// ═══════════════════════════════════════════════════════════════════

/// Distributed run vs serial reference, for `potRel` and `accRel`.
///
/// Per-particle sums are identical; only the order of the global reduction
/// differs. With N = 1000 terms of mixed sign, relative drift stays well
/// below 1e-10.
pub const DISTRIBUTED_VS_SERIAL_REL: f64 = 1e-10;

/// Kernel potential/force jump across `cuton` for a ±1e-9 step in `R²`.
///
/// The slope term moves the values by ~1e-9 relative; anything larger is a
/// discontinuity.
pub const KERNEL_CONTINUITY_REL: f64 = 1e-6;

/// Residual energy and force scalar just inside `cutoff`.
///
/// Both vanish quadratically in `(c² − R²)`; at 1e-10 inside the cutoff they
/// are far below this floor.
pub const CUTOFF_VANISH_ABS: f64 = 1e-15;

// ═══════════════════════════════════════════════════════════════════
// Finite difference
// ═══════════════════════════════════════════════════════════════════

/// Central-difference gradient of `potential_i` against the kernel force.
///
/// Step 1e-5 gives O(h²) ≈ 1e-10 truncation relative to curvature scale,
/// plus cancellation error ~ eps·E/h. 1e-5 relative covers both.
pub const FINITE_DIFFERENCE_REL: f64 = 1e-5;
