//! The field priority table: one immutable table, passed into the fusion
//! engine, never redefined per call site.

use crate::models::{fields, DocumentCategory};

/// Weight of any field the table does not know about, and of a known
/// field recognized from a document that is not its origin of record.
pub const DEFAULT_PRIORITY: u32 = 5;

const IDENTITY_WEIGHT: u32 = 10;
const BUSINESS_WEIGHT: u32 = 20;
const CONTACT_WEIGHT: u32 = 15;
const LEASE_WEIGHT: u32 = 15;

/// All five document categories; used for contact fields, which every
/// source carries with equal authority.
const ALL: &[DocumentCategory] = &DocumentCategory::FUSION_ORDER;

const IDENTITY: &[DocumentCategory] = &[DocumentCategory::Identity];
const LICENSE: &[DocumentCategory] = &[DocumentCategory::License];
const CONTRACT: &[DocumentCategory] = &[DocumentCategory::Contract];
const PREMISES: &[DocumentCategory] =
    &[DocumentCategory::Contract, DocumentCategory::Certificate];

struct Entry {
    field: &'static str,
    weight: u32,
    /// Categories that are the origin of record for this field. A value
    /// recognized anywhere else competes at DEFAULT_PRIORITY.
    home: &'static [DocumentCategory],
}

const TABLE: &[Entry] = &[
    Entry { field: fields::OPERATOR_NAME, weight: IDENTITY_WEIGHT, home: IDENTITY },
    Entry { field: fields::ID_CARD, weight: IDENTITY_WEIGHT, home: IDENTITY },
    Entry { field: fields::GENDER, weight: IDENTITY_WEIGHT, home: IDENTITY },
    Entry { field: fields::NATIONALITY, weight: IDENTITY_WEIGHT, home: IDENTITY },
    Entry { field: fields::ADDRESS, weight: IDENTITY_WEIGHT, home: IDENTITY },
    Entry { field: fields::PHONE, weight: CONTACT_WEIGHT, home: ALL },
    Entry { field: fields::EMAIL, weight: CONTACT_WEIGHT, home: ALL },
    Entry { field: fields::BUSINESS_NAME, weight: BUSINESS_WEIGHT, home: LICENSE },
    Entry { field: fields::BUSINESS_ADDRESS, weight: BUSINESS_WEIGHT, home: LICENSE },
    Entry { field: fields::BUSINESS_SCOPE, weight: BUSINESS_WEIGHT, home: LICENSE },
    Entry { field: fields::REGISTRATION_CODE, weight: BUSINESS_WEIGHT, home: LICENSE },
    Entry { field: fields::REGISTERED_CAPITAL, weight: BUSINESS_WEIGHT, home: LICENSE },
    Entry { field: fields::LANDLORD, weight: LEASE_WEIGHT, home: PREMISES },
    Entry { field: fields::LEASE_START, weight: LEASE_WEIGHT, home: CONTRACT },
    Entry { field: fields::LEASE_END, weight: LEASE_WEIGHT, home: CONTRACT },
    Entry { field: fields::RENT, weight: LEASE_WEIGHT, home: CONTRACT },
];

/// Static field-priority lookup. One instance serves the whole process;
/// the type exists so the table travels explicitly into `merge` instead
/// of being a hidden global.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityTable;

impl PriorityTable {
    /// Effective priority of a candidate value for `field` recognized
    /// from a document of `source` category. The table weight applies
    /// when the source is the field's origin of record; everything else
    /// competes at the default weight.
    pub fn priority_for(&self, field: &str, source: DocumentCategory) -> u32 {
        match TABLE.iter().find(|e| e.field == field) {
            Some(entry) if entry.home.contains(&source) => entry.weight,
            _ => DEFAULT_PRIORITY,
        }
    }

    /// The table weight of a field regardless of source (for reporting).
    pub fn base_weight(&self, field: &str) -> u32 {
        TABLE
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.weight)
            .unwrap_or(DEFAULT_PRIORITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_fields_beat_license_sources_for_personal_attributes() {
        let table = PriorityTable;
        let from_identity = table.priority_for(fields::OPERATOR_NAME, DocumentCategory::Identity);
        let from_license = table.priority_for(fields::OPERATOR_NAME, DocumentCategory::License);
        assert!(from_identity > from_license);
    }

    #[test]
    fn business_fields_authoritative_from_license_only() {
        let table = PriorityTable;
        assert_eq!(
            table.priority_for(fields::BUSINESS_SCOPE, DocumentCategory::License),
            20
        );
        assert_eq!(
            table.priority_for(fields::BUSINESS_SCOPE, DocumentCategory::Contract),
            DEFAULT_PRIORITY
        );
    }

    #[test]
    fn contact_fields_tie_across_sources() {
        let table = PriorityTable;
        let a = table.priority_for(fields::PHONE, DocumentCategory::Identity);
        let b = table.priority_for(fields::PHONE, DocumentCategory::Contract);
        assert_eq!(a, b);
        assert_eq!(a, 15);
    }

    #[test]
    fn landlord_authoritative_from_contract_and_certificate() {
        let table = PriorityTable;
        assert_eq!(table.priority_for(fields::LANDLORD, DocumentCategory::Contract), 15);
        assert_eq!(table.priority_for(fields::LANDLORD, DocumentCategory::Certificate), 15);
        assert_eq!(
            table.priority_for(fields::LANDLORD, DocumentCategory::Identity),
            DEFAULT_PRIORITY
        );
    }

    #[test]
    fn unmapped_fields_default() {
        let table = PriorityTable;
        assert_eq!(table.priority_for("fax", DocumentCategory::License), DEFAULT_PRIORITY);
        assert_eq!(table.base_weight("fax"), DEFAULT_PRIORITY);
    }
}
