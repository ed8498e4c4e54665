//! Record normalizer
//!
//! Maps loosely-typed client records onto the canonical column tuple of a
//! record kind. Only presence is decided here: a value is present when its key
//! exists and is not `null`. Types are left for the store to judge.
//!
//! Provenance columns resolve in two tiers: the record's own value first, then
//! the batch metadata, then `null`.

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{BatchMetadata, FieldValue, NormalizedRecord, RecordKind};
use hms_common::{Error, Result};

/// Two-tier presence resolution for one field
///
/// An empty string counts as present; only an absent or `null` record value
/// falls through to the batch value.
pub fn resolve(record_value: Option<&Value>, batch_value: Option<&FieldValue>) -> FieldValue {
    match record_value {
        Some(value) if !value.is_null() => FieldValue::from(value),
        _ => batch_value.cloned().unwrap_or_default(),
    }
}

/// Normalize a raw collection into canonical tuples
///
/// `records` is the collection as it appeared in the request body; a missing
/// or non-array value is rejected before anything else happens.
pub fn normalize(
    kind: RecordKind,
    records: Option<&Value>,
    metadata: Option<&BatchMetadata>,
) -> Result<Vec<NormalizedRecord>> {
    let items = match records {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(Error::InvalidInput(format!(
                "{} must be an array",
                kind.collection_key()
            )))
        }
    };

    let normalized = items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(normalize_one(kind, fields, metadata)),
            other => Err(Error::InvalidInput(format!(
                "{}[{}] must be an object, got {}",
                kind.collection_key(),
                index,
                json_type_name(other)
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(kind = %kind, records = normalized.len(), "Normalized records");
    Ok(normalized)
}

fn normalize_one(
    kind: RecordKind,
    fields: &Map<String, Value>,
    metadata: Option<&BatchMetadata>,
) -> NormalizedRecord {
    let values = kind
        .columns()
        .iter()
        .map(|spec| {
            // First non-null key wins; aliases never override the canonical name
            let record_value = spec
                .keys
                .iter()
                .filter_map(|key| fields.get(*key))
                .find(|value| !value.is_null());
            let batch_value = spec
                .batch_field
                .and_then(|field| metadata.and_then(|m| m.get(field)));
            resolve(record_value, batch_value)
        })
        .collect();

    NormalizedRecord { kind, values }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
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

    fn metadata(value: Value) -> BatchMetadata {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_tiers() {
        let batch = FieldValue::from("B");
        assert_eq!(resolve(Some(&json!("R")), Some(&batch)), FieldValue::from("R"));
        assert_eq!(resolve(Some(&json!(null)), Some(&batch)), batch);
        assert_eq!(resolve(None, Some(&batch)), batch);
        assert_eq!(resolve(None, None), FieldValue::Null);
        // Empty string is a value, not an absence
        assert_eq!(resolve(Some(&json!("")), Some(&batch)), FieldValue::from(""));
    }

    #[test]
    fn test_record_level_provenance_wins() {
        let records = json!([{"id": "A1", "status": "open", "batchId": "B1"}]);
        let meta = metadata(json!({"batchId": "B0", "fileHash": "H1"}));

        let out = normalize(RecordKind::Incident, Some(&records), Some(&meta)).unwrap();

        assert_eq!(out.len(), 1);
        let record = &out[0];
        assert_eq!(record.key(), Some(&FieldValue::from("A1")));
        assert_eq!(record.get("status"), Some(&FieldValue::from("open")));
        assert_eq!(record.get("batch_id"), Some(&FieldValue::from("B1")));
        assert_eq!(record.get("file_hash"), Some(&FieldValue::from("H1")));
        assert_eq!(record.get("file_name"), Some(&FieldValue::Null));
        assert_eq!(record.get("upload_session_id"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_tuple_follows_column_order() {
        let records = json!([{"site": "JKT", "id": "A1"}]);
        let out = normalize(RecordKind::Incident, Some(&records), None).unwrap();

        let values = &out[0].values;
        assert_eq!(values.len(), RecordKind::Incident.columns().len());
        assert_eq!(values[0], FieldValue::from("A1"));
        assert_eq!(values[3], FieldValue::from("JKT"));
    }

    #[test]
    fn test_mixed_naming_conventions() {
        let records = json!([
            {"id": "C1", "nama": "Acme", "jenis_klien": "corporate", "layanan": "fiber"},
            {"id": "C2", "name": "Beta", "clientType": "retail", "kategori": "gold"}
        ]);
        let out = normalize(RecordKind::Customer, Some(&records), None).unwrap();

        assert_eq!(out[0].get("name"), Some(&FieldValue::from("Acme")));
        assert_eq!(out[0].get("client_type"), Some(&FieldValue::from("corporate")));
        assert_eq!(out[0].get("service"), Some(&FieldValue::from("fiber")));
        assert_eq!(out[1].get("client_type"), Some(&FieldValue::from("retail")));
        assert_eq!(out[1].get("category"), Some(&FieldValue::from("gold")));
    }

    #[test]
    fn test_null_canonical_key_falls_through_to_alias() {
        let records = json!([{"id": "A1", "caseNumber": null, "noCase": "INC-9"}]);
        let out = normalize(RecordKind::Incident, Some(&records), None).unwrap();
        assert_eq!(out[0].get("case_number"), Some(&FieldValue::from("INC-9")));
    }

    #[test]
    fn test_customers_ignore_incident_only_metadata() {
        let records = json!([{"id": "C1"}]);
        let meta = metadata(json!({"fileName": "c.xlsx", "fileHash": "H", "uploadSessionId": "S"}));
        let out = normalize(RecordKind::Customer, Some(&records), Some(&meta)).unwrap();

        assert_eq!(out[0].values.len(), RecordKind::Customer.columns().len());
        assert_eq!(out[0].get("file_name"), Some(&FieldValue::from("c.xlsx")));
        assert_eq!(out[0].get("file_hash"), None);
    }

    #[test]
    fn test_values_pass_through_untyped() {
        let records = json!([{"id": 7, "durationMin": "not-a-number", "powerBefore": -3.5}]);
        let out = normalize(RecordKind::Incident, Some(&records), None).unwrap();

        assert_eq!(out[0].key(), Some(&FieldValue::Integer(7)));
        assert_eq!(out[0].get("duration_min"), Some(&FieldValue::from("not-a-number")));
        assert_eq!(out[0].get("power_before"), Some(&FieldValue::Real(-3.5)));
    }

    #[test]
    fn test_empty_collection() {
        let out = normalize(RecordKind::Customer, Some(&json!([])), None).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_rejects_non_array() {
        for body in [None, Some(json!(null)), Some(json!({"id": "A1"})), Some(json!("A1"))] {
            let err = normalize(RecordKind::Incident, body.as_ref(), None).unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(ref msg) if msg == "incidents must be an array"),
                "unexpected error: {:?}",
                err
            );
        }
    }

    #[test]
    fn test_rejects_non_object_element() {
        let records = json!([{"id": "C1"}, 42]);
        let err = normalize(RecordKind::Customer, Some(&records), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.starts_with("customers[1]")));
    }
}
