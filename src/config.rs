// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration for the direct-sum oracle.
//!
//! Defaults reproduce the reference validation driver: 1000 particles in a
//! cubic cell of edge 10π, 16 uniform particle types, switching between 9.5
//! and 10. Any field can be overridden from a JSON file; omitted fields keep
//! their defaults.
//!
//! ```json
//! { "n_global": 4000, "workers": 8, "cuton": 8.0, "cutoff": 9.0 }
//! ```

use crate::error::{OracleError, Result};
use crate::kernel::{DirectPairKernel, SwitchedPairKernel};
use crate::periodic::{PeriodicDomain, MAX_ID};
use crate::solver::{EwaldParams, LongRangeParams};
use crate::type_table::{ScaleTriple, TypeScaleTable};

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

/// Oracle run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[must_use]
pub struct OracleConfig {
    /// Total particle count
    pub n_global: usize,
    /// In-process workers for distributed runs
    pub workers: usize,
    /// Periodic image shells for the long-range solver
    pub images: usize,
    /// Waves per axis for the reciprocal-space solver
    pub ksize: usize,
    /// Number of particle categories
    pub num_types: usize,
    /// Rank-0 progress logging
    pub verbose: bool,
    /// Cell edge
    pub cycle: f64,
    /// Ewald splitting parameter; `10 / cycle` when absent
    pub alpha: Option<f64>,
    /// Ewald self-term width
    pub sigma: f64,
    /// Switching start radius
    pub cuton: f64,
    /// Interaction cutoff radius
    pub cutoff: f64,
    /// Row-major `num_types²` rescale table; uniform 1 when empty
    pub rescale: Vec<f64>,
    /// Row-major energy scale table; uniform 1e-4 when empty
    pub energy_scale: Vec<f64>,
    /// Row-major force-energy scale table; copies `energy_scale` when empty
    pub force_energy_scale: Vec<f64>,
    /// Seed for synthetic particle generation
    pub seed: u64,
}

/// Uniform rescale entry.
pub const DEFAULT_RESCALE: f64 = 1.0;

/// Uniform energy scale entry.
pub const DEFAULT_ENERGY_SCALE: f64 = 1e-4;

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            n_global: 1000,
            workers: 4,
            images: 6,
            ksize: 14,
            num_types: 16,
            verbose: true,
            cycle: 10.0 * PI,
            alpha: None,
            sigma: 0.25 / PI,
            cuton: 9.5,
            cutoff: 10.0,
            rescale: Vec::new(),
            energy_scale: Vec::new(),
            force_energy_scale: Vec::new(),
            seed: 42,
        }
    }
}

impl OracleConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`OracleError::Io`] or [`OracleError::Json`].
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    /// Defaults, overridden by `--config=<path>` and `--workers=<n>` from
    /// the process arguments.
    ///
    /// # Errors
    ///
    /// Unreadable config file or unparsable worker count.
    pub fn from_args() -> Result<Self> {
        Self::from_arg_list(std::env::args().skip(1))
    }

    /// Same as [`from_args`](Self::from_args) for an explicit argument list.
    ///
    /// # Errors
    ///
    /// Unreadable config file or unparsable worker count.
    pub fn from_arg_list<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let args: Vec<String> = args.into_iter().collect();
        let mut config = match args.iter().find_map(|a| a.strip_prefix("--config=")) {
            Some(path) => Self::from_json_path(Path::new(path))?,
            None => Self::default(),
        };
        if let Some(w) = args.iter().find_map(|a| a.strip_prefix("--workers=")) {
            config.workers = w
                .parse()
                .map_err(|_| OracleError::Config(format!("bad --workers value '{w}'")))?;
        }
        if args.iter().any(|a| a == "--quiet") {
            config.verbose = false;
        }
        Ok(config)
    }

    /// Effective Ewald splitting parameter.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha.unwrap_or(10.0 / self.cycle)
    }

    /// Check every precondition the oracle relies on.
    ///
    /// # Errors
    ///
    /// The first violated precondition.
    pub fn validate(&self) -> Result<()> {
        if self.n_global == 0 {
            return Err(OracleError::Config("n_global must be positive".into()));
        }
        if self.n_global > MAX_ID + 1 {
            return Err(OracleError::IdOutOfRange(self.n_global - 1));
        }
        if self.workers == 0 {
            return Err(OracleError::WorkerOutOfRange {
                worker: 0,
                workers: 0,
            });
        }
        PeriodicDomain::new(self.cycle)?;
        SwitchedPairKernel::new(self.cuton, self.cutoff)?;
        if self.cutoff > 0.5 * self.cycle {
            return Err(OracleError::Config(format!(
                "cutoff {} exceeds half the cell edge {}",
                self.cutoff, self.cycle
            )));
        }
        self.type_table()?;
        Ok(())
    }

    /// Periodic cell.
    ///
    /// # Errors
    ///
    /// [`OracleError::InvalidCycle`].
    pub fn domain(&self) -> Result<PeriodicDomain> {
        PeriodicDomain::new(self.cycle)
    }

    /// Scale table, filling empty tables with the uniform defaults.
    ///
    /// # Errors
    ///
    /// [`OracleError::TableShape`].
    pub fn type_table(&self) -> Result<TypeScaleTable> {
        if self.rescale.is_empty() && self.energy_scale.is_empty() && self.force_energy_scale.is_empty() {
            return TypeScaleTable::uniform(
                self.num_types,
                ScaleTriple {
                    rescale: DEFAULT_RESCALE,
                    energy_scale: DEFAULT_ENERGY_SCALE,
                    force_energy_scale: DEFAULT_ENERGY_SCALE,
                },
            );
        }
        let n2 = self.num_types * self.num_types;
        let fill = |v: &[f64], default: f64| {
            if v.is_empty() {
                vec![default; n2]
            } else {
                v.to_vec()
            }
        };
        let rs = fill(&self.rescale, DEFAULT_RESCALE);
        let gs = fill(&self.energy_scale, DEFAULT_ENERGY_SCALE);
        let fgs = if self.force_energy_scale.is_empty() {
            gs.clone()
        } else {
            self.force_energy_scale.clone()
        };
        TypeScaleTable::new(self.num_types, &rs, &gs, &fgs)
    }

    /// Direct pair kernel for this configuration.
    ///
    /// # Errors
    ///
    /// Invalid radii, cell, or table.
    pub fn direct_kernel(&self) -> Result<DirectPairKernel> {
        Ok(DirectPairKernel::new(
            SwitchedPairKernel::new(self.cuton, self.cutoff)?,
            self.type_table()?,
            self.domain()?,
        ))
    }

    /// Reciprocal-space solver settings.
    #[must_use]
    pub fn ewald_params(&self) -> EwaldParams {
        EwaldParams {
            ksize: self.ksize,
            alpha: self.alpha(),
            sigma: self.sigma,
            cutoff: self.cutoff,
            cycle: self.cycle,
        }
    }

    /// Long-range solver settings.
    #[must_use]
    pub fn long_range_params(&self) -> LongRangeParams {
        LongRangeParams {
            images: self.images,
            cycle: self.cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = OracleConfig::default();
        c.validate().unwrap();
        assert_eq!(c.n_global, 1000);
        assert!((c.alpha() - 10.0 / (10.0 * PI)).abs() < 1e-15);
        assert_eq!(c.ewald_params().ksize, 14);
        assert_eq!(c.long_range_params().images, 6);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: OracleConfig = serde_json::from_str(r#"{ "n_global": 64, "cuton": 8.0 }"#).unwrap();
        assert_eq!(c.n_global, 64);
        assert_eq!(c.cuton, 8.0);
        assert_eq!(c.cutoff, 10.0);
        assert_eq!(c.num_types, 16);
    }

    #[test]
    fn bad_radii_rejected() {
        let c = OracleConfig {
            cuton: 10.0,
            cutoff: 9.5,
            ..OracleConfig::default()
        };
        assert!(matches!(c.validate(), Err(OracleError::InvalidCutoffs { .. })));
    }

    #[test]
    fn cutoff_beyond_half_cell_rejected() {
        let c = OracleConfig {
            cycle: 15.0,
            ..OracleConfig::default()
        };
        assert!(matches!(c.validate(), Err(OracleError::Config(_))));
    }

    #[test]
    fn force_table_copies_energy_table() {
        let c = OracleConfig {
            num_types: 2,
            energy_scale: vec![1.0, 2.0, 3.0, 4.0],
            ..OracleConfig::default()
        };
        let t = c.type_table().unwrap();
        use crate::particle::Category;
        let e = t.get(Category::new(1), Category::new(1)).unwrap();
        assert_eq!(e.energy_scale, 4.0);
        assert_eq!(e.force_energy_scale, 4.0);
        assert_eq!(e.rescale, 1.0);
    }

    #[test]
    fn wrong_table_length_rejected() {
        let c = OracleConfig {
            num_types: 2,
            rescale: vec![1.0; 3],
            ..OracleConfig::default()
        };
        assert!(matches!(c.validate(), Err(OracleError::TableShape { .. })));
    }

    #[test]
    fn arg_list_overrides() {
        let c = OracleConfig::from_arg_list(vec!["--workers=3".to_string(), "--quiet".to_string()]).unwrap();
        assert_eq!(c.workers, 3);
        assert!(!c.verbose);
        assert!(OracleConfig::from_arg_list(vec!["--workers=x".to_string()]).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = OracleConfig::from_json_path(Path::new("/nonexistent/oracle.json")).unwrap_err();
        assert!(matches!(err, OracleError::Io(_)));
    }
}
