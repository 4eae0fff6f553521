//! Runtime assembly for murmur: configuration resolution, the background
//! daemon, and the wiring that hands the event log, model client, and
//! memory contract to the turn runner.

mod config;
mod daemon;
mod error;
mod runtime;

pub use config::{Config, UrgencyThreshold};
pub use daemon::{Daemon, DaemonHandle};
pub use error::{Error, Result};
pub use runtime::Runtime;

/// Install a tracing subscriber honoring `RUST_LOG`. Call once at process
/// start; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
