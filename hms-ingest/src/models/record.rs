//! Record kinds and their canonical column layout
//!
//! Each kind owns a fixed column table. The table order is the tuple order the
//! normalizer produces and the upsert engine binds, so the two can never drift.
//! Every column lists the input keys it accepts; spreadsheets arrive with
//! camelCase, snake_case and legacy helpdesk names mixed together.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::batch::BatchField;

/// Target record kind for bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Incident,
    Customer,
}

/// One canonical column and the input keys that feed it
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Storage column name
    pub column: &'static str,
    /// Accepted record keys, checked in order
    pub keys: &'static [&'static str],
    /// Batch metadata fallback for provenance columns
    pub batch_field: Option<BatchField>,
}

impl ColumnSpec {
    const fn field(column: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            column,
            keys,
            batch_field: None,
        }
    }

    const fn provenance(
        column: &'static str,
        keys: &'static [&'static str],
        batch_field: BatchField,
    ) -> Self {
        Self {
            column,
            keys,
            batch_field: Some(batch_field),
        }
    }
}

const INCIDENT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::field("id", &["id"]),
    ColumnSpec::field("case_number", &["caseNumber", "case_number", "noCase", "no_case"]),
    ColumnSpec::field("priority", &["priority"]),
    ColumnSpec::field("site", &["site"]),
    ColumnSpec::field("ncal", &["ncal"]),
    ColumnSpec::field("status", &["status"]),
    ColumnSpec::field("level", &["level"]),
    ColumnSpec::field("ts", &["ts"]),
    ColumnSpec::field("odp_bts", &["odpBts", "odp_bts"]),
    ColumnSpec::field("start_time", &["startTime", "start_time"]),
    ColumnSpec::field("end_time", &["endTime", "end_time"]),
    ColumnSpec::field(
        "start_escalation_vendor",
        &["startEscalationVendor", "start_escalation_vendor"],
    ),
    ColumnSpec::field("duration_min", &["durationMin", "duration_min"]),
    ColumnSpec::field("duration_vendor_min", &["durationVendorMin", "duration_vendor_min"]),
    ColumnSpec::field(
        "total_duration_pause_min",
        &["totalDurationPauseMin", "total_duration_pause_min"],
    ),
    ColumnSpec::field(
        "total_duration_vendor_min",
        &["totalDurationVendorMin", "total_duration_vendor_min"],
    ),
    ColumnSpec::field("start_pause1", &["startPause1", "start_pause1"]),
    ColumnSpec::field("end_pause1", &["endPause1", "end_pause1"]),
    ColumnSpec::field("start_pause2", &["startPause2", "start_pause2"]),
    ColumnSpec::field("end_pause2", &["endPause2", "end_pause2"]),
    ColumnSpec::field("problem", &["problem"]),
    ColumnSpec::field("cause", &["cause", "penyebab"]),
    ColumnSpec::field(
        "last_action",
        &["lastAction", "last_action", "actionTerakhir", "action_terakhir"],
    ),
    ColumnSpec::field("note", &["note"]),
    ColumnSpec::field(
        "disturbance_class",
        &[
            "disturbanceClass",
            "disturbance_class",
            "klasifikasiGangguan",
            "klasifikasi_gangguan",
        ],
    ),
    ColumnSpec::field("power_before", &["powerBefore", "power_before"]),
    ColumnSpec::field("power_after", &["powerAfter", "power_after"]),
    ColumnSpec::provenance("batch_id", &["batchId", "batch_id"], BatchField::BatchId),
    ColumnSpec::provenance("file_name", &["fileName", "file_name"], BatchField::FileName),
    ColumnSpec::provenance("file_hash", &["fileHash", "file_hash"], BatchField::FileHash),
    ColumnSpec::provenance(
        "upload_session_id",
        &["uploadSessionId", "upload_session_id"],
        BatchField::UploadSessionId,
    ),
];

const CUSTOMER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::field("id", &["id"]),
    ColumnSpec::field("name", &["name", "nama"]),
    ColumnSpec::field(
        "client_type",
        &["clientType", "client_type", "jenisKlien", "jenis_klien"],
    ),
    ColumnSpec::field("service", &["service", "layanan"]),
    ColumnSpec::field("category", &["category", "kategori"]),
    ColumnSpec::provenance("batch_id", &["batchId", "batch_id"], BatchField::BatchId),
    ColumnSpec::provenance("file_name", &["fileName", "file_name"], BatchField::FileName),
];

impl RecordKind {
    /// Storage table
    pub fn table(self) -> &'static str {
        match self {
            RecordKind::Incident => "incidents",
            RecordKind::Customer => "customers",
        }
    }

    /// Request body key holding the record collection
    pub fn collection_key(self) -> &'static str {
        self.table()
    }

    /// Canonical column order
    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            RecordKind::Incident => INCIDENT_COLUMNS,
            RecordKind::Customer => CUSTOMER_COLUMNS,
        }
    }

    /// Natural key the upsert conflicts on
    pub fn key_column(self) -> &'static str {
        "id"
    }

    /// Columns overwritten when the key already exists; everything else keeps
    /// its first-write value
    pub fn conflict_updates(self) -> &'static [&'static str] {
        match self {
            RecordKind::Incident => &["status"],
            RecordKind::Customer => &["name"],
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Incident => write!(f, "incident"),
            RecordKind::Customer => write!(f, "customer"),
        }
    }
}

/// A loosely-typed scalar headed for a store column
///
/// The normalizer only decides presence; it keeps whatever JSON scalar the
/// client sent and lets the store judge whether it fits the column.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "Value")]
pub enum FieldValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Integer(i64::from(*b)),
            Value::Number(n) => {
                match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => FieldValue::Integer(i),
                    (None, Some(f)) if n.is_f64() => FieldValue::Real(f),
                    // u64 beyond i64::MAX keeps its digits
                    _ => FieldValue::Text(n.to_string()),
                }
            }
            Value::String(s) => FieldValue::Text(s.clone()),
            // Nested structures are stored as their JSON text
            Value::Array(_) | Value::Object(_) => FieldValue::Text(value.to_string()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::from(&other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// One canonical tuple, values in `RecordKind::columns()` order
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub kind: RecordKind,
    pub values: Vec<FieldValue>,
}

impl NormalizedRecord {
    /// Value for a column by name
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.kind
            .columns()
            .iter()
            .position(|c| c.column == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Natural key value
    pub fn key(&self) -> Option<&FieldValue> {
        self.get(self.kind.key_column())
    }
}
