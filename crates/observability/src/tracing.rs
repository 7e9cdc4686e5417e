//! Tracing/logging initialization.
//!
//! Ledger operations emit `tracing` events at the points that matter for
//! an audit trail: allocation commits, reversals, and transaction
//! retries. This module wires those events to structured JSON output.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Filtering comes from `RUST_LOG`, defaulting to `info` so allocation
/// and reversal commits are visible but per-candidate walk details
/// (`debug`) are not. Safe to call multiple times (subsequent calls are
/// no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
