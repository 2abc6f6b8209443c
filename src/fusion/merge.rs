//! Fusion: merge any number of partial records into one canonical
//! operator record, then validate its invariants. Pure over its inputs:
//! no I/O, no clock, no randomness.

use std::collections::BTreeMap;

use super::priority::PriorityTable;
use super::FusionError;
use crate::models::validate::{is_valid_id_card, is_valid_phone, normalize_gender};
use crate::models::{fields, DocumentCategory, OperatorRecord, PartialRecord};

/// The winning candidate for one field while merging.
struct Candidate {
    value: String,
    priority: u32,
}

/// Merge partials in insertion order (identity → license → contract →
/// certificate → generic, as the pipeline produced them). For each field
/// the strictly higher-priority candidate wins; on a tie the first-seen
/// value is kept. The fused record is then validated: a missing required
/// field or an invalid ID checksum fails the record, while optional
/// shape violations degrade to `metadata.warnings`.
pub fn merge(
    partials: &[PartialRecord],
    table: &PriorityTable,
) -> Result<OperatorRecord, FusionError> {
    let mut winners: BTreeMap<String, Candidate> = BTreeMap::new();
    let mut source_files: BTreeMap<DocumentCategory, String> = BTreeMap::new();

    for partial in partials {
        source_files
            .entry(partial.category)
            .or_insert_with(|| partial.source_path.display().to_string());

        for (field, value) in &partial.fields {
            let priority = table.priority_for(field, partial.category);
            match winners.get(field) {
                Some(current) if current.priority >= priority => {
                    tracing::debug!(
                        field,
                        kept = %current.value,
                        dropped = %value,
                        kept_priority = current.priority,
                        dropped_priority = priority,
                        "Fusion conflict resolved"
                    );
                }
                _ => {
                    winners.insert(
                        field.clone(),
                        Candidate {
                            value: value.clone(),
                            priority,
                        },
                    );
                }
            }
        }
    }

    // Required-field check before anything else touches the record.
    let mut missing = Vec::new();
    for required in [fields::OPERATOR_NAME, fields::ID_CARD] {
        if !winners.contains_key(required) {
            missing.push(required.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(FusionError::MissingRequired { missing });
    }

    let name = winners[fields::OPERATOR_NAME].value.clone();
    let id_card = winners[fields::ID_CARD].value.clone();

    if !is_valid_id_card(&id_card) {
        return Err(FusionError::InvalidField {
            field: fields::ID_CARD.to_string(),
            reason: format!("checksum invalid for '{id_card}'"),
        });
    }

    let mut record = OperatorRecord::new(name, id_card);
    for (field, candidate) in &winners {
        if field == fields::OPERATOR_NAME || field == fields::ID_CARD {
            continue;
        }
        record.set_field(field, candidate.value.clone());
    }
    record.source_files = source_files;

    apply_shape_checks(&mut record);

    Ok(record)
}

/// Optional-field shape checks. Violations keep the raw value and attach
/// a warning; partial, flagged data beats a hard failure when the field
/// is not identity-critical.
fn apply_shape_checks(record: &mut OperatorRecord) {
    if let Some(phone) = record.phone.clone() {
        if !is_valid_phone(&phone) {
            record.push_warning(format!(
                "{}: '{phone}' does not match the mobile-number shape",
                fields::PHONE
            ));
        }
    }

    if let Some(raw_gender) = record.gender.clone() {
        match normalize_gender(&raw_gender) {
            Some(token) => record.gender = Some(token.to_string()),
            None => {
                record.push_warning(format!(
                    "{}: '{raw_gender}' is not a recognizable gender value",
                    fields::GENDER
                ));
            }
        }
    }

    if let Some(email) = record.email.clone() {
        if !email.contains('@') {
            record.push_warning(format!(
                "{}: '{email}' does not look like an email address",
                fields::EMAIL
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validate::GENDER_MALE;

    const VALID_ID: &str = "11010519491231002X";

    fn identity_partial(name: &str) -> PartialRecord {
        let mut p = PartialRecord::new(DocumentCategory::Identity, "/in/id.jpg");
        p.set(fields::OPERATOR_NAME, name);
        p.set(fields::ID_CARD, VALID_ID);
        p
    }

    fn license_partial(operator: &str, business: &str) -> PartialRecord {
        let mut p = PartialRecord::new(DocumentCategory::License, "/in/lic.jpg");
        p.set(fields::OPERATOR_NAME, operator);
        p.set(fields::BUSINESS_NAME, business);
        p.set(fields::BUSINESS_SCOPE, "retail");
        p
    }

    #[test]
    fn identity_name_beats_license_operator_name() {
        let partials = vec![identity_partial("A"), license_partial("B", "Shop")];
        let record = merge(&partials, &PriorityTable).unwrap();
        assert_eq!(record.operator_name, "A");
        assert_eq!(record.business_name.as_deref(), Some("Shop"));
    }

    #[test]
    fn tie_goes_to_first_seen_partial() {
        let mut first = PartialRecord::new(DocumentCategory::Contract, "/in/a.pdf");
        first.set(fields::RENT, "3000");
        let mut second = PartialRecord::new(DocumentCategory::Contract, "/in/b.pdf");
        second.set(fields::RENT, "3500");
        second.set(fields::OPERATOR_NAME, "ignored");

        let partials = vec![identity_partial("A"), first, second];
        let record = merge(&partials, &PriorityTable).unwrap();
        assert_eq!(record.rent.as_deref(), Some("3000"));
    }

    #[test]
    fn merge_is_deterministic() {
        let partials = vec![identity_partial("A"), license_partial("B", "Shop")];
        let once = serde_json::to_string(&merge(&partials, &PriorityTable).unwrap()).unwrap();
        let twice = serde_json::to_string(&merge(&partials, &PriorityTable).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_required_fields_named_exactly() {
        // Unparseable identity scan plus a license without the operator
        // line: neither required field is present anywhere.
        let empty_identity = PartialRecord::new(DocumentCategory::Identity, "/in/id.jpg");
        let mut license = PartialRecord::new(DocumentCategory::License, "/in/lic.jpg");
        license.set(fields::BUSINESS_NAME, "Shop");
        license.set(fields::BUSINESS_SCOPE, "retail");

        let err = merge(&[empty_identity, license], &PriorityTable).unwrap_err();
        match err {
            FusionError::MissingRequired { missing } => {
                assert_eq!(missing, vec!["operator_name".to_string(), "id_card".to_string()]);
            }
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_identity_with_license_operator_still_missing_id_card() {
        // The license's operator line is a real recognition of the
        // person's name, just from a lower-priority source, so it counts
        // toward required-field presence; only id_card has no candidate
        // from any source.
        let empty_identity = PartialRecord::new(DocumentCategory::Identity, "/in/id.jpg");
        let license = license_partial("B", "Shop");

        let err = merge(&[empty_identity, license], &PriorityTable).unwrap_err();
        match err {
            FusionError::MissingRequired { missing } => {
                assert_eq!(missing, vec!["id_card".to_string()]);
            }
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn bad_checksum_fails_validation() {
        let mut p = PartialRecord::new(DocumentCategory::Identity, "/in/id.jpg");
        p.set(fields::OPERATOR_NAME, "A");
        p.set(fields::ID_CARD, "110105194912310021"); // wrong check digit

        let err = merge(&[p], &PriorityTable).unwrap_err();
        match err {
            FusionError::InvalidField { field, .. } => assert_eq!(field, "id_card"),
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn bad_phone_shape_degrades_to_warning() {
        let mut p = identity_partial("A");
        p.set(fields::PHONE, "12345");
        let record = merge(&[p], &PriorityTable).unwrap();
        assert_eq!(record.phone.as_deref(), Some("12345"), "raw value kept");
        assert!(record.warnings().iter().any(|w| w.starts_with("phone:")));
    }

    #[test]
    fn gender_normalized_to_canonical_token() {
        let mut p = identity_partial("A");
        p.set(fields::GENDER, "男");
        let record = merge(&[p], &PriorityTable).unwrap();
        assert_eq!(record.gender.as_deref(), Some(GENDER_MALE));
        assert!(record.warnings().is_empty());
    }

    #[test]
    fn unknown_fields_survive_in_metadata() {
        let mut p = identity_partial("A");
        p.set("备注", "含物业费");
        let record = merge(&[p], &PriorityTable).unwrap();
        assert_eq!(record.field("备注"), Some("含物业费"));
    }

    #[test]
    fn source_files_tag_first_path_per_category() {
        let partials = vec![identity_partial("A"), license_partial("B", "Shop")];
        let record = merge(&partials, &PriorityTable).unwrap();
        assert_eq!(
            record.source_files.get(&DocumentCategory::Identity).map(String::as_str),
            Some("/in/id.jpg")
        );
        assert_eq!(
            record.source_files.get(&DocumentCategory::License).map(String::as_str),
            Some("/in/lic.jpg")
        );
    }
}
