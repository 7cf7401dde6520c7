// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for the direct-sum oracle.
//!
//! Every precondition the oracle relies on (non-empty ranges, id and flag bit
//! widths, category bounds, table shape, switching radii) is reported through
//! [`OracleError`] at the API boundary. Validation binaries treat any error as
//! fatal and exit non-zero.

use thiserror::Error;

/// Errors arising from partitioning, encoding, kernel setup, collectives,
/// configuration, or external solvers.
#[derive(Debug, Error)]
pub enum OracleError {
    /// `split_range` was asked to divide an empty or inverted range.
    #[error("cannot split empty range [{begin}, {end})")]
    EmptyRange {
        /// Range start
        begin: usize,
        /// Range end (exclusive)
        end: usize,
    },

    /// Worker index outside `[0, workers)`, or a zero-sized group.
    #[error("worker {worker} out of range for group of {workers}")]
    WorkerOutOfRange {
        /// Requested worker index
        worker: usize,
        /// Group size
        workers: usize,
    },

    /// Particle id does not fit the 29-bit id field of an encoded index.
    #[error("particle id {0} exceeds the 29-bit index field")]
    IdOutOfRange(usize),

    /// Wrap flags do not fit in 3 bits.
    #[error("wrap flags {0:#b} exceed 3 bits")]
    FlagsOutOfRange(u32),

    /// Particle category outside the type table.
    #[error("category {category} out of range for {num_types} types")]
    CategoryOutOfRange {
        /// Offending category
        category: usize,
        /// Number of types in the table
        num_types: usize,
    },

    /// Scale tables are not `num_types × num_types`.
    #[error("type table '{table}' has {len} entries, expected {expected}")]
    TableShape {
        /// Which table (rescale / energy / force)
        table: &'static str,
        /// Observed length
        len: usize,
        /// `num_types²`
        expected: usize,
    },

    /// Switching radii violate `0 < cuton < cutoff`.
    #[error("invalid switching radii: cuton={cuton}, cutoff={cutoff}")]
    InvalidCutoffs {
        /// Inner radius
        cuton: f64,
        /// Outer radius
        cutoff: f64,
    },

    /// Periodic cell edge must be finite and positive.
    #[error("invalid periodic cycle {0}")]
    InvalidCycle(f64),

    /// Two buffers that must align per particle or per rank do not.
    #[error("length mismatch in {context}: {left} vs {right}")]
    LengthMismatch {
        /// Where the mismatch was detected
        context: &'static str,
        /// First length
        left: usize,
        /// Second length
        right: usize,
    },

    /// A collective found its shared state poisoned by a panicking peer.
    #[error("collective '{0}' poisoned by a failed worker")]
    CollectivePoisoned(&'static str),

    /// A collective expected a message that never arrived, or of the wrong type.
    #[error("collective '{op}' missing parcel from rank {from}")]
    MissingParcel {
        /// Collective name
        op: &'static str,
        /// Source rank
        from: usize,
    },

    /// A worker thread panicked before returning.
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// External long-range or reciprocal-space solver reported a failure.
    #[error("external solver failed: {0}")]
    SolverFailure(String),

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OracleError>;
