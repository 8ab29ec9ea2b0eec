//! Telemetry helpers for structured logging and tracing.
//!
//! The scheduler logs through `tracing` under the `prometheus_quota_scheduler`
//! target: pass summaries at `info`, per-worker decisions at `debug`, and
//! anomalies (future-dated polls, expired acks, lost decisions) at `warn`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "prometheus_quota_scheduler=info";

/// Install a fmt subscriber for embedders that have none.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Returns false if a
/// global subscriber was already installed, in which case nothing changes.
pub fn init_tracing() -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
