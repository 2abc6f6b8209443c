//! Workflow orchestration: the resumable node sequence and its
//! checkpoint trail.

pub mod checkpoint;
pub mod generate;
pub mod orchestrator;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointManager, CheckpointMeta, IndexEntry};
pub use generate::{DocumentGenerator, GenerationError, NullGenerator};
pub use orchestrator::{Orchestrator, ResumePoint, RunOutcome};
pub use state::{PipelineInput, WorkingState, WORKING_STATE_VERSION};

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::fusion::FusionError;
use crate::recognition::RecognitionError;
use crate::store::DatabaseError;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid pipeline input: {0}")]
    Input(String),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Fusion error: {0}")]
    Fusion(#[from] FusionError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}
