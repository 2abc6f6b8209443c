//! Pluggable recognition engines behind one capability interface.
//!
//! The adapter probes an ordered list of candidate engines once at
//! construction and binds to the first that initializes. It reports the
//! bound engine's confidence but never switches engines mid-call; the
//! retry-on-low-confidence policy belongs to the pipeline layer above.

pub mod adapter;
pub mod http;
pub mod parsers;

pub use adapter::RecognitionAdapter;
pub use http::HttpRecognizer;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::DocumentCategory;

#[derive(Error, Debug)]
pub enum RecognitionError {
    /// No candidate engine could initialize. Fatal for the run.
    #[error("No recognition engine available: {0}")]
    Unavailable(String),

    /// One recognize call failed (engine error or timeout). Retryable by
    /// the caller against another engine or later.
    #[error("Recognition failed: {0}")]
    Failed(String),
}

/// Engine-specific output before any parsing: an opaque JSON payload plus
/// the engine's own confidence score in [0, 1].
#[derive(Debug, Clone)]
pub struct RawEngineResult {
    pub payload: Value,
    pub confidence: f32,
}

/// Normalized recognition output: flat raw-key/value pairs, the engine's
/// confidence, and a parse-error marker instead of a propagated panic
/// when the payload was structurally unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecognition {
    pub category: DocumentCategory,
    pub engine: String,
    pub fields: BTreeMap<String, String>,
    pub confidence: f32,
    pub parse_error: Option<String>,
}

/// One recognition engine (cloud-hosted service, local recognizer, …).
///
/// Implementations must be safe to call concurrently for different
/// images: no shared mutable state beyond the handle itself.
pub trait RecognitionEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap liveness/initialization check, called once at bind time.
    fn probe(&self) -> Result<(), RecognitionError>;

    /// Run recognition on one image. May block on network or process I/O
    /// for multi-second durations; the adapter applies the timeout.
    fn recognize(
        &self,
        category: DocumentCategory,
        image_path: &Path,
    ) -> Result<RawEngineResult, RecognitionError>;
}
