//! Upload session model
//!
//! One session tracks one upload attempt:
//! pending → processing → {completed | failed | partial}
//!
//! Sessions are created by the client with its own id, updated sparsely while the
//! client streams batches, and never deleted here.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Which record kind a session is uploading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "incidents")]
    Incident,
    #[serde(alias = "customers")]
    Customer,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Incident => "incident",
            DataType::Customer => "customer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "incident" | "incidents" => Some(DataType::Incident),
            "customer" | "customers" => Some(DataType::Customer),
            _ => None,
        }
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Pending,
    /// Older clients report this state as "uploading"
    #[serde(alias = "uploading")]
    Processing,
    Completed,
    Failed,
    Partial,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Partial => "partial",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SessionStatus::Pending),
            "processing" | "uploading" => Some(SessionStatus::Processing),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            "partial" => Some(SessionStatus::Partial),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Partial
        )
    }
}

/// Reference to the offending record: a spreadsheet row or a record id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
    Row(i64),
    Id(String),
}

/// One structured entry in a session's error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ErrorLogEntryRepr")]
pub struct ErrorLogEntry {
    pub record: RecordRef,
    pub message: String,
    /// Any further context the client attached (sheet, column, raw value, ...)
    #[serde(flatten, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ErrorLogEntry {
    pub fn new(record: RecordRef, message: impl Into<String>) -> Self {
        Self {
            record,
            message: message.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorLogEntryRepr {
    Structured(StructuredEntry),
    /// Bare message strings describe batch-level failures, filed against row 0
    Message(String),
}

#[derive(Deserialize)]
struct StructuredEntry {
    #[serde(alias = "row", alias = "recordId", alias = "record_id")]
    record: RecordRef,
    #[serde(alias = "reason")]
    message: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<ErrorLogEntryRepr> for ErrorLogEntry {
    fn from(repr: ErrorLogEntryRepr) -> Self {
        match repr {
            ErrorLogEntryRepr::Structured(entry) => Self {
                record: entry.record,
                message: entry.message,
                extra: entry.extra,
            },
            ErrorLogEntryRepr::Message(message) => Self::new(RecordRef::Row(0), message),
        }
    }
}

/// Descriptor for creating a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUploadSession {
    pub id: String,
    pub file_name: String,
    pub file_hash: String,
    pub data_type: DataType,
    /// Milliseconds since the Unix epoch
    #[serde(deserialize_with = "deserialize_timestamp_ms")]
    pub upload_timestamp: i64,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub record_count: i64,
    #[serde(default)]
    pub file_size: Option<i64>,
}

impl NewUploadSession {
    /// Shape checks serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_string());
        }
        if self.record_count < 0 {
            return Err(format!("recordCount must not be negative: {}", self.record_count));
        }
        if let Some(size) = self.file_size {
            if size < 0 {
                return Err(format!("fileSize must not be negative: {}", size));
            }
        }
        Ok(())
    }
}

/// Stored session as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub id: String,
    pub file_name: String,
    pub file_hash: String,
    pub file_size: Option<i64>,
    pub data_type: DataType,
    pub upload_timestamp: i64,
    pub status: SessionStatus,
    pub record_count: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub error_log: Vec<ErrorLogEntry>,
    pub created_at: String,
}

/// Final tallies reported when an upload finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTotals {
    pub success_count: i64,
    pub error_count: i64,
}

impl SessionTotals {
    /// Terminal status implied by the tallies
    pub fn terminal_status(&self) -> SessionStatus {
        match (self.success_count, self.error_count) {
            (_, 0) => SessionStatus::Completed,
            (0, _) => SessionStatus::Failed,
            _ => SessionStatus::Partial,
        }
    }
}

/// Query filter for listing sessions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilter {
    pub data_type: Option<DataType>,
    pub status: Option<SessionStatus>,
    pub limit: Option<u32>,
}

/// Interpret a JSON timestamp as epoch milliseconds
///
/// Accepts integer milliseconds, numeric strings and RFC 3339 strings.
pub fn timestamp_ms_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.timestamp_millis())
        }),
        _ => None,
    }
}

fn deserialize_timestamp_ms<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    timestamp_ms_from_json(&value).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "uploadTimestamp must be epoch milliseconds or an RFC 3339 string, got {}",
            value
        ))
    })
}
