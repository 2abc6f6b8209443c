use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::enums::DocumentCategory;

/// Output of one extraction pass over a single document: a sparse field
/// map tagged with its source category and originating file. Ephemeral:
/// produced and consumed within one pipeline run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub category: DocumentCategory,
    pub source_path: PathBuf,
    /// Canonical field name -> recognized value. Empty values are never stored.
    pub fields: BTreeMap<String, String>,
    /// Set when the raw engine output was unparseable; the fields map is
    /// empty in that case. Carried instead of propagated so fusion can
    /// still run over the remaining documents.
    pub parse_error: Option<String>,
}

impl PartialRecord {
    pub fn new(category: DocumentCategory, source_path: impl Into<PathBuf>) -> Self {
        Self {
            category,
            source_path: source_path.into(),
            fields: BTreeMap::new(),
            parse_error: None,
        }
    }

    /// Record a field value. Blank values are dropped so they can never
    /// shadow a real value from another source during fusion.
    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.fields.insert(field.to_string(), trimmed.to_string());
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_dropped() {
        let mut p = PartialRecord::new(DocumentCategory::Identity, "/tmp/id.jpg");
        p.set("operator_name", "  ");
        p.set("id_card", " 11010519491231002X ");
        assert!(p.get("operator_name").is_none());
        assert_eq!(p.get("id_card"), Some("11010519491231002X"));
    }

    #[test]
    fn new_partial_is_empty() {
        let p = PartialRecord::new(DocumentCategory::License, "/tmp/lic.jpg");
        assert!(p.is_empty());
        assert!(p.parse_error.is_none());
    }
}
