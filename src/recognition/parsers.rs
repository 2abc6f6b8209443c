//! Per-category raw-result parsers.
//!
//! Each parser turns one engine's JSON payload into flat raw-key/value
//! pairs. Parsers never fail on missing optional fields; only a payload
//! with no usable structure at all yields an empty map plus an error
//! marker, and even that is returned as a value, never propagated.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::DocumentCategory;

/// Parse an engine payload for the given category. Returns the flat
/// field pairs and, when the payload was structurally unusable, a
/// human-readable error marker.
pub fn parse(category: DocumentCategory, payload: &Value) -> (BTreeMap<String, String>, Option<String>) {
    match category {
        DocumentCategory::Identity => parse_identity(payload),
        DocumentCategory::License => parse_license(payload),
        _ => parse_generic(payload),
    }
}

/// Identity-document payloads nest per-field text under `words_result`,
/// the shape cloud OCR services return for structured card recognition.
fn parse_identity(payload: &Value) -> (BTreeMap<String, String>, Option<String>) {
    if let Some(words) = payload.get("words_result") {
        return collect_fields(words);
    }
    parse_generic(payload)
}

/// License payloads use the same nested shape but may also arrive as a
/// flat object from local engines.
fn parse_license(payload: &Value) -> (BTreeMap<String, String>, Option<String>) {
    if let Some(words) = payload.get("words_result") {
        return collect_fields(words);
    }
    parse_generic(payload)
}

/// Fallback parser: a flat object of strings, or `{"fields": {...}}`.
fn parse_generic(payload: &Value) -> (BTreeMap<String, String>, Option<String>) {
    if let Some(inner) = payload.get("fields") {
        return collect_fields(inner);
    }
    collect_fields(payload)
}

/// Collect string-valued entries from an object. Values may be plain
/// strings or `{"words": "..."}` wrappers; anything else is skipped as a
/// missing optional field rather than an error.
fn collect_fields(value: &Value) -> (BTreeMap<String, String>, Option<String>) {
    let Some(object) = value.as_object() else {
        return (
            BTreeMap::new(),
            Some(format!("expected JSON object, got {}", type_name(value))),
        );
    };

    let mut fields = BTreeMap::new();
    for (key, entry) in object {
        // Transport metadata, not a document field.
        if key == "confidence" {
            continue;
        }
        let text = match entry {
            Value::String(s) => Some(s.clone()),
            Value::Object(inner) => inner.get("words").and_then(Value::as_str).map(str::to_string),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        if let Some(text) = text {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                fields.insert(key.clone(), trimmed.to_string());
            }
        }
    }
    (fields, None)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_words_result_shape() {
        let payload = json!({
            "words_result": {
                "姓名": {"words": "王伟"},
                "公民身份号码": {"words": "11010519491231002X"},
                "性别": {"words": "女"},
            },
            "confidence": 0.93,
        });
        let (fields, err) = parse(DocumentCategory::Identity, &payload);
        assert!(err.is_none());
        assert_eq!(fields.get("姓名").map(String::as_str), Some("王伟"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn license_flat_shape() {
        let payload = json!({"名称": "王记面馆", "经营范围": "餐饮服务", "confidence": 0.88});
        let (fields, err) = parse(DocumentCategory::License, &payload);
        assert!(err.is_none());
        assert_eq!(fields.get("名称").map(String::as_str), Some("王记面馆"));
        assert!(!fields.contains_key("confidence"));
    }

    #[test]
    fn missing_optional_fields_are_not_errors() {
        let payload = json!({"words_result": {"姓名": {"words": "王伟"}}});
        let (fields, err) = parse(DocumentCategory::Identity, &payload);
        assert!(err.is_none());
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn unparseable_payload_yields_marker_not_panic() {
        let payload = json!("garbage scan output");
        let (fields, err) = parse(DocumentCategory::Identity, &payload);
        assert!(fields.is_empty());
        assert!(err.unwrap().contains("string"));
    }

    #[test]
    fn non_string_entries_skipped() {
        let payload = json!({"fields": {"name": "Wang", "boxes": [1, 2, 3], "score": 12}});
        let (fields, err) = parse(DocumentCategory::Generic, &payload);
        assert!(err.is_none());
        assert_eq!(fields.get("name").map(String::as_str), Some("Wang"));
        assert_eq!(fields.get("score").map(String::as_str), Some("12"));
        assert!(!fields.contains_key("boxes"));
    }
}
