//! Dynamic field updater for upload sessions
//!
//! Turns a sparse client map such as `{"successCount": 5}` into one
//! `UPDATE upload_sessions SET ... WHERE id = ?` touching exactly the supplied
//! columns. Only names in [`SESSION_FIELDS`] are accepted; each entry carries
//! its storage column and a coercion from JSON to a storable value.
//!
//! Assignments are emitted in whitelist order, so the statement does not depend
//! on the key order of the incoming map.

use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::models::{timestamp_ms_from_json, DataType, ErrorLogEntry, FieldValue, SessionStatus};
use hms_common::{Error, Result};

type Coerce = fn(&Value) -> std::result::Result<FieldValue, String>;

/// One updatable session field
pub struct SessionField {
    /// External (camelCase) name
    pub name: &'static str,
    /// Other accepted spellings
    pub aliases: &'static [&'static str],
    /// Storage column
    pub column: &'static str,
    coerce: Coerce,
}

/// Whitelist of updatable session fields
pub const SESSION_FIELDS: &[SessionField] = &[
    SessionField {
        name: "fileName",
        aliases: &["file_name"],
        column: "file_name",
        coerce: coerce_text,
    },
    SessionField {
        name: "fileHash",
        aliases: &["file_hash"],
        column: "file_hash",
        coerce: coerce_text,
    },
    SessionField {
        name: "fileSize",
        aliases: &["file_size"],
        column: "file_size",
        coerce: coerce_optional_count,
    },
    SessionField {
        name: "dataType",
        aliases: &["data_type"],
        column: "data_type",
        coerce: coerce_data_type,
    },
    SessionField {
        name: "uploadTimestamp",
        aliases: &["upload_timestamp"],
        column: "upload_timestamp",
        coerce: coerce_timestamp,
    },
    SessionField {
        name: "status",
        aliases: &[],
        column: "status",
        coerce: coerce_status,
    },
    SessionField {
        name: "recordCount",
        aliases: &["record_count"],
        column: "record_count",
        coerce: coerce_count,
    },
    SessionField {
        name: "successCount",
        aliases: &["success_count"],
        column: "success_count",
        coerce: coerce_count,
    },
    SessionField {
        name: "errorCount",
        aliases: &["error_count"],
        column: "error_count",
        coerce: coerce_count,
    },
    SessionField {
        name: "errorLog",
        aliases: &["error_log"],
        column: "error_log",
        coerce: coerce_error_log,
    },
];

impl SessionField {
    fn accepts(&self, key: &str) -> bool {
        self.name == key || self.aliases.iter().any(|alias| *alias == key)
    }
}

/// Validated column assignments for one session update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    assignments: Vec<(&'static str, FieldValue)>,
}

impl SessionPatch {
    /// Translate and coerce a client field map
    ///
    /// Rejects unknown names, a field supplied under two spellings, and values
    /// the field's coercion refuses.
    pub fn from_json(body: &Value) -> Result<Self> {
        let fields = body
            .as_object()
            .ok_or_else(|| Error::InvalidInput("session update must be a JSON object".to_string()))?;
        Self::from_map(fields)
    }

    pub fn from_map(fields: &Map<String, Value>) -> Result<Self> {
        let mut unknown: Vec<&str> = fields
            .keys()
            .map(String::as_str)
            .filter(|key| !SESSION_FIELDS.iter().any(|f| f.accepts(key)))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(Error::InvalidInput(format!(
                "unknown session field(s): {}",
                unknown.join(", ")
            )));
        }

        let mut assignments = Vec::new();
        for field in SESSION_FIELDS {
            let supplied: Vec<(&String, &Value)> =
                fields.iter().filter(|(key, _)| field.accepts(key)).collect();

            let value = match supplied.as_slice() {
                [] => continue,
                [(_, value)] => *value,
                _ => {
                    let keys: Vec<&str> = supplied.iter().map(|(k, _)| k.as_str()).collect();
                    return Err(Error::InvalidInput(format!(
                        "{} supplied more than once ({})",
                        field.name,
                        keys.join(", ")
                    )));
                }
            };

            let coerced = (field.coerce)(value)
                .map_err(|reason| Error::InvalidInput(format!("{}: {}", field.name, reason)))?;
            assignments.push((field.column, coerced));
        }

        Ok(Self { assignments })
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Storage columns this patch writes, in statement order
    pub fn columns(&self) -> Vec<&'static str> {
        self.assignments.iter().map(|(column, _)| *column).collect()
    }

    /// Coerced value for a storage column
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.assignments
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, value)| value)
    }
}

/// Dynamic Field Updater
pub struct SessionUpdater {
    db: SqlitePool,
}

impl SessionUpdater {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Apply a patch as one statement, returning rows affected
    ///
    /// An unknown id affects zero rows and is not an error. An empty patch never
    /// reaches the store.
    pub async fn apply(&self, id: &str, patch: &SessionPatch) -> Result<u64> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE upload_sessions SET ");
        let mut set = builder.separated(", ");
        for (column, value) in &patch.assignments {
            set.push(format!("{column} = "));
            match value {
                FieldValue::Null => set.push_bind_unseparated(None::<String>),
                FieldValue::Integer(i) => set.push_bind_unseparated(*i),
                FieldValue::Real(f) => set.push_bind_unseparated(*f),
                FieldValue::Text(s) => set.push_bind_unseparated(s.clone()),
            };
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder.build().execute(&self.db).await?;

        debug!(
            session_id = %id,
            columns = ?patch.columns(),
            rows = result.rows_affected(),
            "Applied session update"
        );

        Ok(result.rows_affected())
    }
}

fn coerce_text(value: &Value) -> std::result::Result<FieldValue, String> {
    match value {
        Value::String(s) => Ok(FieldValue::Text(s.clone())),
        other => Err(format!("expected a string, got {}", other)),
    }
}

fn count_from_json(value: &Value) -> std::result::Result<i64, String> {
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n),
        _ => Err(format!("expected a non-negative integer, got {}", value)),
    }
}

fn coerce_count(value: &Value) -> std::result::Result<FieldValue, String> {
    count_from_json(value).map(FieldValue::Integer)
}

fn coerce_optional_count(value: &Value) -> std::result::Result<FieldValue, String> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }
    coerce_count(value)
}

fn coerce_data_type(value: &Value) -> std::result::Result<FieldValue, String> {
    value
        .as_str()
        .and_then(DataType::parse)
        .map(|dt| FieldValue::from(dt.as_str()))
        .ok_or_else(|| format!("expected \"incident\" or \"customer\", got {}", value))
}

fn coerce_status(value: &Value) -> std::result::Result<FieldValue, String> {
    value
        .as_str()
        .and_then(SessionStatus::parse)
        .map(|status| FieldValue::from(status.as_str()))
        .ok_or_else(|| format!("unknown status {}", value))
}

fn coerce_timestamp(value: &Value) -> std::result::Result<FieldValue, String> {
    timestamp_ms_from_json(value)
        .map(FieldValue::Integer)
        .ok_or_else(|| format!("expected epoch milliseconds or RFC 3339, got {}", value))
}

/// The log is stored as JSON text; `null` clears it
fn coerce_error_log(value: &Value) -> std::result::Result<FieldValue, String> {
    let entries: Vec<ErrorLogEntry> = match value {
        Value::Null => Vec::new(),
        Value::Array(_) => serde_json::from_value(value.clone())
            .map_err(|e| format!("invalid error entry: {}", e))?,
        other => return Err(format!("expected an array of error entries, got {}", other)),
    };

    serde_json::to_string(&entries)
        .map(FieldValue::Text)
        .map_err(|e| format!("failed to serialize: {}", e))
}
