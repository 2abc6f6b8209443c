//! Typed working state passed between pipeline nodes.
//!
//! Deliberately a versioned struct with named fields per stage, not a
//! loose map: a missing or renamed field at an orchestrator boundary is
//! a compile error, and checkpoints can refuse snapshots written by an
//! incompatible schema.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::archive::ArchiveEntry;
use crate::models::{DocumentCategory, OperatorRecord, PartialRecord};
use crate::recognition::RawRecognition;

/// Bump when WorkingState changes shape incompatibly.
pub const WORKING_STATE_VERSION: u32 = 1;

/// What one pipeline run is asked to process: one file per document
/// category, plus an optional prior canonical record to merge against
/// for incremental updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInput {
    pub documents: BTreeMap<DocumentCategory, PathBuf>,
    pub prior_record: Option<OperatorRecord>,
}

impl PipelineInput {
    pub fn new(documents: BTreeMap<DocumentCategory, PathBuf>) -> Self {
        Self {
            documents,
            prior_record: None,
        }
    }

    pub fn with_prior(mut self, prior: OperatorRecord) -> Self {
        self.prior_record = Some(prior);
        self
    }
}

/// Everything a run has produced so far. Snapshotted verbatim into every
/// checkpoint; restoring a checkpoint yields exactly this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingState {
    pub version: u32,
    pub run_id: Uuid,
    pub input: PipelineInput,
    /// Classify output: input documents in fusion order.
    pub classified: Vec<(DocumentCategory, PathBuf)>,
    /// Recognize output per category.
    pub raw_results: BTreeMap<DocumentCategory, RawRecognition>,
    /// Categories whose best recognition stayed below the confidence
    /// threshold even after the retry; informational for review.
    pub low_confidence: Vec<DocumentCategory>,
    /// Extract output, in fusion order.
    pub partials: Vec<PartialRecord>,
    /// Fuse output.
    pub fused: Option<OperatorRecord>,
    /// Archive output.
    pub archive: Option<ArchiveEntry>,
    /// Persist output: the surrogate id of the stored row.
    pub record_id: Option<Uuid>,
    /// Generate output: the flat field map handed to the generator, and
    /// the document path it produced (if any).
    pub output_fields: Option<BTreeMap<String, String>>,
    pub generated_document: Option<PathBuf>,
}

impl WorkingState {
    pub fn new(input: PipelineInput) -> Self {
        Self {
            version: WORKING_STATE_VERSION,
            run_id: Uuid::new_v4(),
            input,
            classified: Vec::new(),
            raw_results: BTreeMap::new(),
            low_confidence: Vec::new(),
            partials: Vec::new(),
            fused: None,
            archive: None,
            record_id: None,
            output_fields: None,
            generated_document: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_json() {
        let mut documents = BTreeMap::new();
        documents.insert(DocumentCategory::Identity, PathBuf::from("/in/id.jpg"));
        let state = WorkingState::new(PipelineInput::new(documents));

        let json = serde_json::to_string(&state).unwrap();
        let back: WorkingState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.version, WORKING_STATE_VERSION);
    }

    #[test]
    fn fresh_runs_get_distinct_ids() {
        let a = WorkingState::new(PipelineInput::new(BTreeMap::new()));
        let b = WorkingState::new(PipelineInput::new(BTreeMap::new()));
        assert_ne!(a.run_id, b.run_id);
    }
}
