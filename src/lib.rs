// SPDX-License-Identifier: AGPL-3.0-only

//! hotSpring direct-sum oracle: ground truth for distributed periodic
//! particle solvers.
//!
//! Partitions particles across workers, folds positions into a periodic
//! cell, evaluates a switched inverse-12/6 pair interaction by brute force,
//! and compares any other field producer against it with globally reduced
//! relative errors.
//!
//! ## Modules
//!   - `partition`: contiguous id shares per worker, ownership masks
//!   - `periodic`: wrap/unwrap, minimum image, packed `{id, flags}` index
//!   - `particle` / `type_table`: particle records and per-pair scales
//!   - `kernel`: O(n_local × n_global) switched pair kernel
//!   - `comm`: blocking collectives (serial, in-process thread group)
//!   - `redistribute`: all-to-all particle exchange
//!   - `solver`: external long-range / reciprocal-space solver contracts
//!   - `validation`: producer comparison (`potRel`, `accRel`) and check report
//!   - `synthetic`: deterministic neutral test systems
//!   - `config`, `tolerances`, `provenance`, `logging`
//!
//! ## Validation binaries
//!   - `validate_direct_vdw`: two-body, continuity, distributed vs serial
//!   - `validate_periodic_codec`: partition tiling, index and wrap round trips

#![warn(missing_docs)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod comm;
pub mod config;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod partition;
pub mod particle;
pub mod periodic;
pub mod provenance;
pub mod redistribute;
pub mod solver;
pub mod synthetic;
pub mod tolerances;
pub mod type_table;
pub mod validation;

pub use error::{OracleError, Result};
