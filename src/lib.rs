//! RegDesk: document intake and field fusion for operator registration.
//!
//! Scanned registration documents go through a fixed pipeline (classify,
//! recognize, extract, fuse, archive, persist, generate) producing one
//! canonical operator record per person, a provenance archive of the
//! source scans, and a checkpoint trail any interrupted run can resume
//! from.

pub mod archive;
pub mod config;
pub mod extract;
pub mod fusion;
pub mod models;
pub mod recognition;
pub mod store;
pub mod workflow;

use tracing_subscriber::EnvFilter;

/// Initialize tracing. RUST_LOG overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("RegDesk starting v{}", config::APP_VERSION);
}
