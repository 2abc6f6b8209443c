//! Input contract for the document generator, an external collaborator.
//!
//! The pipeline hands it the canonical record's flat field map (well-known
//! keys plus `current_date`); what it does with templates is its business.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[error("Document generation failed: {0}")]
pub struct GenerationError(pub String);

pub trait DocumentGenerator: Send {
    /// Produce an output document from the flat field map. Returns the
    /// path of the generated document, or None when the generator has
    /// nothing to emit for this record.
    fn generate(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<Option<PathBuf>, GenerationError>;
}

/// Generator used when no downstream template filler is wired in; the
/// run still completes and the field map stays available in the final
/// checkpoint.
#[derive(Debug, Default)]
pub struct NullGenerator;

impl DocumentGenerator for NullGenerator {
    fn generate(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<Option<PathBuf>, GenerationError> {
        tracing::debug!(field_count = fields.len(), "No document generator configured");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_generator_emits_nothing() {
        let fields = BTreeMap::from([("operator_name".to_string(), "王伟".to_string())]);
        assert_eq!(NullGenerator.generate(&fields).unwrap(), None);
    }
}
