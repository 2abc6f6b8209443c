//! Application directories and pipeline tuning knobs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "RegDesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "regdesk=info".to_string()
}

/// Get the application data directory (~/RegDesk/ on all platforms)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Directory holding the per-identity-key archive entries
pub fn archive_dir() -> PathBuf {
    app_data_dir().join("archive")
}

/// Directory holding checkpoint snapshots and their index
pub fn checkpoints_dir() -> PathBuf {
    app_data_dir().join("checkpoints")
}

/// Path of the record-store database file
pub fn database_path() -> PathBuf {
    app_data_dir().join("regdesk.db")
}

/// Tuning knobs for one pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Recognition results below this confidence trigger one caller-level
    /// retry; results still below it are flagged for review.
    pub confidence_threshold: f32,
    /// Per-call timeout applied by the recognition adapter. An elapsed
    /// timeout reports as a failed (retryable) recognition, never a hang.
    pub recognition_timeout_secs: u64,
    /// How many checkpoints the retention prune keeps per run.
    pub checkpoint_retention: usize,
    /// Delete originals after a verified archive copy. Off by default;
    /// archiving must never be destructive unless explicitly asked.
    pub delete_originals: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            recognition_timeout_secs: 30,
            checkpoint_retention: 20,
            delete_originals: false,
        }
    }
}
