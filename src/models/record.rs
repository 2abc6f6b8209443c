//! The canonical operator record and its well-known field names.

use std::collections::BTreeMap;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::DocumentCategory;

/// Well-known canonical field names. Extractors map raw engine keys onto
/// these; the fusion engine and the document-generator contract speak
/// nothing else.
pub mod fields {
    pub const OPERATOR_NAME: &str = "operator_name";
    pub const ID_CARD: &str = "id_card";
    pub const GENDER: &str = "gender";
    pub const NATIONALITY: &str = "nationality";
    pub const ADDRESS: &str = "address";
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const BUSINESS_NAME: &str = "business_name";
    pub const BUSINESS_ADDRESS: &str = "business_address";
    pub const BUSINESS_SCOPE: &str = "business_scope";
    pub const REGISTRATION_CODE: &str = "registration_code";
    pub const REGISTERED_CAPITAL: &str = "registered_capital";
    pub const LANDLORD: &str = "landlord";
    pub const LEASE_START: &str = "lease_start";
    pub const LEASE_END: &str = "lease_end";
    pub const RENT: &str = "rent";
    /// Derived output-contract field, never recognized from a document.
    pub const CURRENT_DATE: &str = "current_date";
}

/// Metadata key holding shape-check warnings attached during fusion.
pub const META_WARNINGS: &str = "warnings";

/// The fused, validated entity: one row per person, keyed by the
/// national ID number. Created by the fusion engine, persisted by the
/// record store, never mutated outside an explicit update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRecord {
    /// Surrogate id. The record store preserves the existing row's id
    /// when an upsert falls back to update.
    pub id: Uuid,
    pub operator_name: String,
    pub id_card: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub business_name: Option<String>,
    pub business_address: Option<String>,
    pub business_scope: Option<String>,
    pub registration_code: Option<String>,
    pub registered_capital: Option<String>,
    pub landlord: Option<String>,
    pub lease_start: Option<String>,
    pub lease_end: Option<String>,
    pub rent: Option<String>,
    /// Archived source file per document category (provenance).
    pub source_files: BTreeMap<DocumentCategory, String>,
    /// Free-form metadata, including `warnings` and any fields the
    /// priority table does not know about.
    pub metadata: BTreeMap<String, Value>,
}

impl OperatorRecord {
    pub fn new(operator_name: impl Into<String>, id_card: impl Into<String>) -> Self {
        let id_card = id_card.into();
        Self {
            // v5 over the natural key keeps fusion a pure function: the
            // same identity always fuses to the same surrogate id.
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, id_card.as_bytes()),
            operator_name: operator_name.into(),
            id_card,
            phone: None,
            email: None,
            gender: None,
            nationality: None,
            address: None,
            business_name: None,
            business_address: None,
            business_scope: None,
            registration_code: None,
            registered_capital: None,
            landlord: None,
            lease_start: None,
            lease_end: None,
            rent: None,
            source_files: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Read a field by its canonical name. Unknown names fall through to
    /// string-valued metadata entries.
    pub fn field(&self, name: &str) -> Option<&str> {
        use fields::*;
        match name {
            OPERATOR_NAME => Some(self.operator_name.as_str()),
            ID_CARD => Some(self.id_card.as_str()),
            PHONE => self.phone.as_deref(),
            EMAIL => self.email.as_deref(),
            GENDER => self.gender.as_deref(),
            NATIONALITY => self.nationality.as_deref(),
            ADDRESS => self.address.as_deref(),
            BUSINESS_NAME => self.business_name.as_deref(),
            BUSINESS_ADDRESS => self.business_address.as_deref(),
            BUSINESS_SCOPE => self.business_scope.as_deref(),
            REGISTRATION_CODE => self.registration_code.as_deref(),
            REGISTERED_CAPITAL => self.registered_capital.as_deref(),
            LANDLORD => self.landlord.as_deref(),
            LEASE_START => self.lease_start.as_deref(),
            LEASE_END => self.lease_end.as_deref(),
            RENT => self.rent.as_deref(),
            _ => self.metadata.get(name).and_then(Value::as_str),
        }
    }

    /// Write a field by its canonical name. Unknown names land in the
    /// metadata map so no recognized value is ever silently dropped.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        use fields::*;
        let value = value.into();
        match name {
            OPERATOR_NAME => self.operator_name = value,
            ID_CARD => self.id_card = value,
            PHONE => self.phone = Some(value),
            EMAIL => self.email = Some(value),
            GENDER => self.gender = Some(value),
            NATIONALITY => self.nationality = Some(value),
            ADDRESS => self.address = Some(value),
            BUSINESS_NAME => self.business_name = Some(value),
            BUSINESS_ADDRESS => self.business_address = Some(value),
            BUSINESS_SCOPE => self.business_scope = Some(value),
            REGISTRATION_CODE => self.registration_code = Some(value),
            REGISTERED_CAPITAL => self.registered_capital = Some(value),
            LANDLORD => self.landlord = Some(value),
            LEASE_START => self.lease_start = Some(value),
            LEASE_END => self.lease_end = Some(value),
            RENT => self.rent = Some(value),
            _ => {
                self.metadata.insert(name.to_string(), Value::String(value));
            }
        }
    }

    /// Attach a shape-check warning under `metadata.warnings`.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        let entry = self
            .metadata
            .entry(META_WARNINGS.to_string())
            .or_insert_with(|| Value::Array(vec![]));
        if let Value::Array(list) = entry {
            list.push(Value::String(warning.into()));
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        match self.metadata.get(META_WARNINGS) {
            Some(Value::Array(list)) => list
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => vec![],
        }
    }

    /// The flat output contract consumed by the document generator:
    /// every non-empty field under its well-known key, string-valued
    /// metadata extras, and the derived `current_date`.
    pub fn to_field_map(&self) -> BTreeMap<String, String> {
        use fields::*;
        let mut map = BTreeMap::new();
        let known = [
            OPERATOR_NAME,
            ID_CARD,
            PHONE,
            EMAIL,
            GENDER,
            NATIONALITY,
            ADDRESS,
            BUSINESS_NAME,
            BUSINESS_ADDRESS,
            BUSINESS_SCOPE,
            REGISTRATION_CODE,
            REGISTERED_CAPITAL,
            LANDLORD,
            LEASE_START,
            LEASE_END,
            RENT,
        ];
        for name in known {
            if let Some(value) = self.field(name) {
                if !value.is_empty() {
                    map.insert(name.to_string(), value.to_string());
                }
            }
        }
        for (key, value) in &self.metadata {
            if key == META_WARNINGS {
                continue;
            }
            if let Some(s) = value.as_str() {
                map.insert(key.clone(), s.to_string());
            }
        }
        map.insert(
            CURRENT_DATE.to_string(),
            Local::now().format("%Y-%m-%d").to_string(),
        );
        map
    }
}
