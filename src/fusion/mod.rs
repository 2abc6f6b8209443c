//! Fusion engine: priority-based merging of partial records plus
//! canonical-record validation.

pub mod merge;
pub mod priority;

pub use merge::merge;
pub use priority::{PriorityTable, DEFAULT_PRIORITY};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    /// A required field (name, national ID) is absent from every source.
    /// Fatal for the record, never silently dropped.
    #[error("Validation failed: missing required field(s): {}", missing.join(", "))]
    MissingRequired { missing: Vec<String> },

    /// A required field is present but violates its invariant.
    #[error("Validation failed: {field}: {reason}")]
    InvalidField { field: String, reason: String },
}
