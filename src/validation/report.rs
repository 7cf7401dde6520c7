// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail accumulator for validation binaries.
//!
//! Each binary records its checks against constants from
//! [`crate::tolerances`], prints one summary line per check and exits 0 when
//! every check passed, 1 otherwise.

use super::RelativeErrors;

use std::process;

/// One recorded check.
#[derive(Debug, Clone)]
pub struct Check {
    /// Label printed in the summary
    pub label: String,
    /// Outcome
    pub passed: bool,
    /// Measured value
    pub observed: f64,
    /// Reference value or threshold
    pub expected: f64,
    /// Tolerance applied
    pub tolerance: f64,
    /// How `tolerance` was applied
    pub mode: ToleranceMode,
}

/// How a check compares `observed` with `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    /// `|observed − expected| < tolerance`
    Absolute,
    /// `|observed − expected| / |expected| < tolerance`
    Relative,
    /// `observed < threshold`
    UpperBound,
    /// Boolean outcome
    Exact,
}

impl ToleranceMode {
    /// Whether `observed` is acceptable against `expected`. NaN never is.
    #[must_use]
    pub fn accepts(self, observed: f64, expected: f64, tolerance: f64) -> bool {
        match self {
            Self::Absolute => (observed - expected).abs() < tolerance,
            Self::Relative if expected.abs() > f64::EPSILON => {
                ((observed - expected) / expected).abs() < tolerance
            }
            // ~0 reference: fall back to absolute
            Self::Relative => observed.abs() < tolerance,
            Self::UpperBound => observed < expected,
            Self::Exact => observed == expected,
        }
    }
}

impl std::fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Absolute => "abs",
            Self::Relative => "rel",
            Self::UpperBound => "<",
            Self::Exact => "bool",
        };
        f.write_str(s)
    }
}

/// Ordered list of checks for one validation binary.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationReport {
    /// Binary name
    pub name: String,
    /// Checks in recording order
    pub checks: Vec<Check>,
}

impl ValidationReport {
    /// Empty report for binary `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    fn record(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64, mode: ToleranceMode) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: mode.accepts(observed, expected, tolerance),
            observed,
            expected,
            tolerance,
            mode,
        });
    }

    /// `|observed − expected| < tolerance`.
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        self.record(label, observed, expected, tolerance, ToleranceMode::Absolute);
    }

    /// Relative check; absolute when `expected` is ~0.
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        self.record(label, observed, expected, tolerance, ToleranceMode::Relative);
    }

    /// `observed < threshold`.
    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) {
        self.record(label, observed, threshold, threshold, ToleranceMode::UpperBound);
    }

    /// Record a yes/no outcome.
    pub fn check_bool(&mut self, label: &str, passed: bool) {
        self.record(label, f64::from(u8::from(passed)), 1.0, 0.0, ToleranceMode::Exact);
    }

    /// Record `potRel` and `accRel` as two upper-bound checks.
    pub fn check_relative_errors(&mut self, label: &str, errors: &RelativeErrors, tolerance: f64) {
        self.check_upper(&format!("{label} potRel"), errors.pot_rel, tolerance);
        self.check_upper(&format!("{label} accRel"), errors.acc_rel, tolerance);
    }

    /// Checks that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Checks recorded.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether every check passed (vacuously true when empty).
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Summary text, one line per check.
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write;
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {}: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        for c in &self.checks {
            let icon = if c.passed { "✓" } else { "✗" };
            let _ = writeln!(
                s,
                "  {icon} {}: observed={:.6e}, expected={:.6e}, tol={:.2e} ({})",
                c.label, c.observed, c.expected, c.tolerance, c.mode
            );
        }
        s
    }

    /// Print the summary and exit 0 when all checks passed, 1 otherwise.
    pub fn finish(&self) -> ! {
        println!();
        print!("{}", self.summary());
        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        }
        let failed: Vec<&str> = self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.label.as_str())
            .collect();
        println!("FAILED CHECKS: {}", failed.join(", "));
        process::exit(1);
    }
}
