// SPDX-License-Identifier: AGPL-3.0-only

//! Structured logging setup for binaries.
//!
//! Library code only emits `tracing` events. Binaries call [`init`] once;
//! progress output (`info`) is enabled on rank 0 when verbose, everything else
//! logs warnings only. `RUST_LOG` overrides both.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive for a rank.
#[must_use]
pub fn default_directive(verbose: bool, rank: usize) -> &'static str {
    if verbose && rank == 0 {
        "info"
    } else {
        "warn"
    }
}

/// Install the global fmt subscriber. A second call is a no-op.
pub fn init(verbose: bool, rank: usize) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, rank)));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
