//! Field extraction: one engine's raw output → a typed partial record.
//!
//! Maps category-specific raw keys (the labels cloud and local engines
//! emit, in Chinese and English) onto canonical field names, and derives
//! secondary fields that need no additional I/O. Cross-field validation
//! is deliberately absent here; that belongs to the fusion engine.

use std::path::Path;

use crate::models::validate::gender_from_id_card;
use crate::models::{fields, DocumentCategory, PartialRecord};
use crate::recognition::RawRecognition;

/// Raw-key → canonical-field mapping for identity documents.
const IDENTITY_KEYS: &[(&str, &str)] = &[
    ("姓名", fields::OPERATOR_NAME),
    ("name", fields::OPERATOR_NAME),
    ("full name", fields::OPERATOR_NAME),
    ("公民身份号码", fields::ID_CARD),
    ("身份证号", fields::ID_CARD),
    ("id_number", fields::ID_CARD),
    ("性别", fields::GENDER),
    ("sex", fields::GENDER),
    ("gender", fields::GENDER),
    ("民族", fields::NATIONALITY),
    ("nationality", fields::NATIONALITY),
    ("ethnicity", fields::NATIONALITY),
    ("住址", fields::ADDRESS),
    ("address", fields::ADDRESS),
];

/// Raw-key → canonical-field mapping for business licenses.
const LICENSE_KEYS: &[(&str, &str)] = &[
    ("名称", fields::BUSINESS_NAME),
    ("企业名称", fields::BUSINESS_NAME),
    ("business_name", fields::BUSINESS_NAME),
    ("company_name", fields::BUSINESS_NAME),
    ("经营者", fields::OPERATOR_NAME),
    ("经营者姓名", fields::OPERATOR_NAME),
    ("operator", fields::OPERATOR_NAME),
    ("operator_name", fields::OPERATOR_NAME),
    ("经营场所", fields::BUSINESS_ADDRESS),
    ("住所", fields::BUSINESS_ADDRESS),
    ("business_address", fields::BUSINESS_ADDRESS),
    ("经营范围", fields::BUSINESS_SCOPE),
    ("business_scope", fields::BUSINESS_SCOPE),
    ("注册号", fields::REGISTRATION_CODE),
    ("统一社会信用代码", fields::REGISTRATION_CODE),
    ("registration_code", fields::REGISTRATION_CODE),
    ("credit_code", fields::REGISTRATION_CODE),
    ("注册资本", fields::REGISTERED_CAPITAL),
    ("registered_capital", fields::REGISTERED_CAPITAL),
];

/// Raw-key → canonical-field mapping for lease contracts.
const CONTRACT_KEYS: &[(&str, &str)] = &[
    ("出租方", fields::LANDLORD),
    ("甲方", fields::LANDLORD),
    ("landlord", fields::LANDLORD),
    ("租赁起始日期", fields::LEASE_START),
    ("lease_start", fields::LEASE_START),
    ("租赁终止日期", fields::LEASE_END),
    ("lease_end", fields::LEASE_END),
    ("租金", fields::RENT),
    ("rent", fields::RENT),
    ("联系电话", fields::PHONE),
    ("phone", fields::PHONE),
];

/// Raw-key → canonical-field mapping for property certificates.
const CERTIFICATE_KEYS: &[(&str, &str)] = &[
    ("权利人", fields::LANDLORD),
    ("房屋所有权人", fields::LANDLORD),
    ("owner", fields::LANDLORD),
    ("房屋坐落", fields::BUSINESS_ADDRESS),
    ("坐落", fields::BUSINESS_ADDRESS),
    ("location", fields::BUSINESS_ADDRESS),
];

/// Keys any category may carry (contact details, mostly).
const GENERIC_KEYS: &[(&str, &str)] = &[
    ("电话", fields::PHONE),
    ("手机", fields::PHONE),
    ("phone", fields::PHONE),
    ("mobile", fields::PHONE),
    ("邮箱", fields::EMAIL),
    ("email", fields::EMAIL),
];

fn key_table(category: DocumentCategory) -> &'static [(&'static str, &'static str)] {
    match category {
        DocumentCategory::Identity => IDENTITY_KEYS,
        DocumentCategory::License => LICENSE_KEYS,
        DocumentCategory::Contract => CONTRACT_KEYS,
        DocumentCategory::Certificate => CERTIFICATE_KEYS,
        DocumentCategory::Generic => &[],
    }
}

fn canonical_name(category: DocumentCategory, raw_key: &str) -> Option<&'static str> {
    let lowered = raw_key.trim().to_lowercase();
    key_table(category)
        .iter()
        .chain(GENERIC_KEYS.iter())
        .find(|(raw, _)| *raw == lowered || *raw == raw_key.trim())
        .map(|(_, canonical)| *canonical)
}

/// Turn one recognition result into a partial record tagged with its
/// source file. Raw keys without a mapping are carried through under
/// their own name so fusion can still keep them (at default priority).
pub fn extract(
    category: DocumentCategory,
    raw: &RawRecognition,
    source_path: &Path,
) -> PartialRecord {
    let mut partial = PartialRecord::new(category, source_path);
    partial.parse_error = raw.parse_error.clone();

    for (raw_key, value) in &raw.fields {
        match canonical_name(category, raw_key) {
            Some(canonical) => partial.set(canonical, value.clone()),
            None => partial.set(raw_key, value.clone()),
        }
    }

    // Gender can be read off the ID number when the card scan missed it.
    // Jurisdiction-bound digit-parity rule, see models::validate.
    if partial.get(fields::GENDER).is_none() {
        if let Some(id) = partial.get(fields::ID_CARD) {
            if let Some(gender) = gender_from_id_card(id) {
                partial.set(fields::GENDER, gender);
            }
        }
    }

    tracing::debug!(
        category = category.as_str(),
        source = %source_path.display(),
        field_count = partial.fields.len(),
        "Extracted partial record"
    );

    partial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validate::{GENDER_FEMALE, GENDER_MALE};
    use std::collections::BTreeMap;

    fn raw(category: DocumentCategory, pairs: &[(&str, &str)]) -> RawRecognition {
        RawRecognition {
            category,
            engine: "mock".into(),
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            confidence: 0.9,
            parse_error: None,
        }
    }

    #[test]
    fn identity_keys_map_to_canonical_names() {
        let raw = raw(
            DocumentCategory::Identity,
            &[
                ("姓名", "王伟"),
                ("公民身份号码", "11010519491231002X"),
                ("住址", "北京市东城区某街1号"),
            ],
        );
        let partial = extract(DocumentCategory::Identity, &raw, Path::new("/in/id.jpg"));

        assert_eq!(partial.get(fields::OPERATOR_NAME), Some("王伟"));
        assert_eq!(partial.get(fields::ID_CARD), Some("11010519491231002X"));
        assert_eq!(partial.get(fields::ADDRESS), Some("北京市东城区某街1号"));
        assert_eq!(partial.source_path(), Path::new("/in/id.jpg"));
    }

    #[test]
    fn license_operator_name_maps_from_chinese_key() {
        let raw = raw(
            DocumentCategory::License,
            &[("经营者姓名", "李强"), ("名称", "李记五金店"), ("经营范围", "五金零售")],
        );
        let partial = extract(DocumentCategory::License, &raw, Path::new("/in/lic.jpg"));

        assert_eq!(partial.get(fields::OPERATOR_NAME), Some("李强"));
        assert_eq!(partial.get(fields::BUSINESS_NAME), Some("李记五金店"));
        assert_eq!(partial.get(fields::BUSINESS_SCOPE), Some("五金零售"));
    }

    #[test]
    fn gender_derived_from_id_when_missing() {
        let raw = raw(
            DocumentCategory::Identity,
            &[("公民身份号码", "11010519491231002X")],
        );
        let partial = extract(DocumentCategory::Identity, &raw, Path::new("/in/id.jpg"));
        assert_eq!(partial.get(fields::GENDER), Some(GENDER_FEMALE));
    }

    #[test]
    fn recognized_gender_not_overwritten_by_derivation() {
        let raw = raw(
            DocumentCategory::Identity,
            &[("性别", "男"), ("公民身份号码", "11010519491231002X")],
        );
        let partial = extract(DocumentCategory::Identity, &raw, Path::new("/in/id.jpg"));
        // Raw value kept; normalization happens during fusion.
        assert_eq!(partial.get(fields::GENDER), Some("男"));
        assert_ne!(partial.get(fields::GENDER), Some(GENDER_MALE));
    }

    #[test]
    fn unmapped_keys_carried_through() {
        let raw = raw(DocumentCategory::Contract, &[("备注", "含物业费")]);
        let partial = extract(DocumentCategory::Contract, &raw, Path::new("/in/lease.pdf"));
        assert_eq!(partial.get("备注"), Some("含物业费"));
    }

    #[test]
    fn parse_error_marker_propagates() {
        let mut bad = raw(DocumentCategory::Identity, &[]);
        bad.parse_error = Some("expected JSON object, got string".into());
        let partial = extract(DocumentCategory::Identity, &bad, Path::new("/in/id.jpg"));
        assert!(partial.is_empty());
        assert!(partial.parse_error.is_some());
    }
}
