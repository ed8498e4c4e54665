//! Ingestion facade
//!
//! Entry point for every ingestion request. Sequences the normalizer, upsert
//! engine, session tracker and field updater, shapes their outcomes into
//! response bodies, and classifies every failure before it leaves. The facade
//! itself never issues a query; store access belongs to the components it
//! owns.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use super::normalizer::normalize;
use super::session_tracker::SessionTracker;
use super::session_updater::{SessionPatch, SessionUpdater};
use super::upsert_engine::UpsertEngine;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    BatchMetadata, DataType, ErrorLogEntry, FieldValue, NewUploadSession, RecordKind, SessionFilter,
    SessionStatus, SessionTotals, UploadSession,
};

/// Bulk import outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    /// Rows affected, inserts and updates combined
    pub created: u64,
}

/// Session write outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    /// Rows touched by a sparse update; absent for creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEnvelope {
    pub success: bool,
    pub session: UploadSession,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionListResponse {
    pub success: bool,
    pub count: usize,
    pub sessions: Vec<UploadSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendErrorsResponse {
    pub success: bool,
    pub appended: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteResponse {
    pub success: bool,
    pub status: SessionStatus,
}

/// Ingestion Facade
pub struct IngestionService {
    upserts: UpsertEngine,
    sessions: SessionTracker,
    updater: SessionUpdater,
}

impl IngestionService {
    /// Build every component over the same pool
    pub fn new(db: SqlitePool) -> Self {
        Self::from_parts(
            UpsertEngine::new(db.clone()),
            SessionTracker::new(db.clone()),
            SessionUpdater::new(db),
        )
    }

    pub fn from_parts(
        upserts: UpsertEngine,
        sessions: SessionTracker,
        updater: SessionUpdater,
    ) -> Self {
        Self {
            upserts,
            sessions,
            updater,
        }
    }

    /// Bulk import `{"incidents": [...], "metadata": {...}}`
    pub async fn import_incidents(&self, body: &Value) -> ApiResult<ImportResponse> {
        self.import(RecordKind::Incident, body).await
    }

    /// Bulk import `{"customers": [...], "metadata": {...}}`
    pub async fn import_customers(&self, body: &Value) -> ApiResult<ImportResponse> {
        self.import(RecordKind::Customer, body).await
    }

    async fn import(&self, kind: RecordKind, body: &Value) -> ApiResult<ImportResponse> {
        let operation = match kind {
            RecordKind::Incident => "import_incidents",
            RecordKind::Customer => "import_customers",
        };

        let metadata = batch_metadata(body).map_err(|e| reject(operation, e))?;
        let records = normalize(kind, body.get(kind.collection_key()), metadata.as_ref())
            .map_err(|e| reject(operation, e))?;

        let created = self
            .upserts
            .upsert(kind, &records)
            .await
            .map_err(|e| reject(operation, e))?;

        info!(
            kind = %kind,
            records = records.len(),
            rows = created,
            upload_session_id = metadata
                .as_ref()
                .and_then(|m| m.upload_session_id.as_ref())
                .and_then(|v| v.as_text())
                .unwrap_or("-"),
            "Bulk import applied"
        );

        Ok(ImportResponse {
            success: true,
            message: format!("Imported {} {} records", records.len(), kind),
            created,
        })
    }

    /// Create a session from its descriptor
    pub async fn create_session(&self, body: &Value) -> ApiResult<SessionResponse> {
        let descriptor: NewUploadSession = serde_json::from_value(body.clone()).map_err(|e| {
            reject(
                "create_session",
                hms_common::Error::InvalidInput(format!("invalid session descriptor: {}", e)),
            )
        })?;

        self.sessions
            .create(&descriptor)
            .await
            .map_err(|e| reject("create_session", e))?;

        Ok(SessionResponse {
            success: true,
            message: format!("Upload session {} created", descriptor.id),
            updated: None,
        })
    }

    /// Sparse update; an unknown id reports zero rows rather than failing
    pub async fn update_session(&self, id: &str, body: &Value) -> ApiResult<SessionResponse> {
        let patch = SessionPatch::from_json(body).map_err(|e| reject("update_session", e))?;

        let updated = self
            .updater
            .apply(id, &patch)
            .await
            .map_err(|e| reject("update_session", e))?;

        if updated == 0 && !patch.is_empty() {
            warn!(session_id = %id, "Session update matched no rows");
        }

        let status = patch
            .get("status")
            .and_then(FieldValue::as_text)
            .and_then(SessionStatus::parse);
        if let Some(status) = status.filter(|s| updated > 0 && s.is_terminal()) {
            info!(session_id = %id, status = status.as_str(), "Upload session settled by update");
        }

        Ok(SessionResponse {
            success: true,
            message: format!("Upload session {} updated", id),
            updated: Some(updated),
        })
    }

    pub async fn get_session(&self, id: &str) -> ApiResult<SessionEnvelope> {
        let session = self
            .sessions
            .get(id)
            .await
            .map_err(|e| reject("get_session", e))?
            .ok_or_else(|| ApiError::NotFound(format!("upload session {}", id)))?;

        Ok(SessionEnvelope {
            success: true,
            session,
        })
    }

    /// List sessions from raw query parameters (`dataType`, `status`, `limit`)
    pub async fn list_sessions(
        &self,
        params: &HashMap<String, String>,
    ) -> ApiResult<SessionListResponse> {
        let filter = session_filter(params).map_err(|e| reject("list_sessions", e))?;

        let sessions = self
            .sessions
            .list(&filter)
            .await
            .map_err(|e| reject("list_sessions", e))?;

        Ok(SessionListResponse {
            success: true,
            count: sessions.len(),
            sessions,
        })
    }

    /// Append to the error log; accepts `{"errors": [...]}` or a bare array
    pub async fn append_errors(&self, id: &str, body: &Value) -> ApiResult<AppendErrorsResponse> {
        let raw = match body {
            Value::Object(map) => map.get("errors").cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        let entries: Vec<ErrorLogEntry> = match raw {
            Value::Array(_) => serde_json::from_value(raw).map_err(|e| {
                reject(
                    "append_errors",
                    hms_common::Error::InvalidInput(format!("invalid error entry: {}", e)),
                )
            })?,
            _ => {
                return Err(reject(
                    "append_errors",
                    hms_common::Error::InvalidInput("errors must be an array".to_string()),
                ))
            }
        };

        let appended = self
            .sessions
            .append_errors(id, &entries)
            .await
            .map_err(|e| reject("append_errors", e))?;

        Ok(AppendErrorsResponse {
            success: true,
            appended,
        })
    }

    /// Record final counts and derive the terminal status
    pub async fn complete_session(&self, id: &str, body: &Value) -> ApiResult<CompleteResponse> {
        let totals: SessionTotals = serde_json::from_value(body.clone()).map_err(|e| {
            reject(
                "complete_session",
                hms_common::Error::InvalidInput(format!("invalid session totals: {}", e)),
            )
        })?;

        let status = self
            .sessions
            .finalize(id, totals)
            .await
            .map_err(|e| reject("complete_session", e))?;

        Ok(CompleteResponse {
            success: true,
            status,
        })
    }
}

/// Classify a component failure and log it at the matching level
fn reject(operation: &'static str, err: hms_common::Error) -> ApiError {
    let classified = ApiError::from(err);
    match &classified {
        ApiError::Store(_) | ApiError::Internal(_) => {
            error!(operation, error = %classified, "Ingestion request failed")
        }
        _ => warn!(operation, error = %classified, "Ingestion request rejected"),
    }
    classified
}

fn batch_metadata(body: &Value) -> hms_common::Result<Option<BatchMetadata>> {
    if !body.is_object() {
        return Err(hms_common::Error::InvalidInput(
            "request body must be a JSON object".to_string(),
        ));
    }

    match body.get("metadata") {
        None | Some(Value::Null) => Ok(None),
        Some(meta @ Value::Object(_)) => serde_json::from_value(meta.clone())
            .map(Some)
            .map_err(|e| hms_common::Error::InvalidInput(format!("invalid metadata: {}", e))),
        Some(_) => Err(hms_common::Error::InvalidInput(
            "metadata must be an object".to_string(),
        )),
    }
}

fn session_filter(params: &HashMap<String, String>) -> hms_common::Result<SessionFilter> {
    let invalid = |what: &str, value: &str| {
        hms_common::Error::InvalidInput(format!("invalid {} filter: {}", what, value))
    };

    let data_type = params
        .get("dataType")
        .map(|v| DataType::parse(v).ok_or_else(|| invalid("dataType", v)))
        .transpose()?;
    let status = params
        .get("status")
        .map(|v| SessionStatus::parse(v).ok_or_else(|| invalid("status", v)))
        .transpose()?;
    let limit = params
        .get("limit")
        .map(|v| v.parse::<u32>().map_err(|_| invalid("limit", v)))
        .transpose()?;

    Ok(SessionFilter {
        data_type,
        status,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hms_common::db::init_memory_database;
    use serde_json::json;

    async fn service() -> (IngestionService, SqlitePool) {
        let db = init_memory_database().await.unwrap();
        (IngestionService::new(db.clone()), db)
    }

    fn session_body(id: &str) -> Value {
        json!({
            "id": id,
            "fileName": "incidents.xlsx",
            "fileHash": "H1",
            "dataType": "incident",
            "uploadTimestamp": 1_700_000_000_000i64,
            "status": "pending",
            "recordCount": 2
        })
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let (service, db) = service().await;
        let body = json!({
            "incidents": [{"id": "A1", "status": "open", "batchId": "B1"}],
            "metadata": {"fileHash": "H1"}
        });

        let first = service.import_incidents(&body).await.unwrap();
        assert!(first.success);
        assert_eq!(first.created, 1);

        let again = json!({
            "incidents": [{"id": "A1", "status": "closed"}],
            "metadata": {"fileHash": "H2"}
        });
        service.import_incidents(&again).await.unwrap();

        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT id, status, file_hash FROM incidents")
                .fetch_all(&db)
                .await
                .unwrap();
        assert_eq!(rows, vec![("A1".to_string(), "closed".to_string(), "H1".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_import_succeeds_with_zero() {
        let (service, _db) = service().await;
        let response = service
            .import_customers(&json!({"customers": []}))
            .await
            .unwrap();
        assert_eq!(
            response,
            ImportResponse {
                success: true,
                message: "Imported 0 customer records".to_string(),
                created: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_non_sequence_rejected_before_store() {
        let (service, db) = service().await;
        // A closed pool would turn any store call into a Store error
        db.close().await;

        for body in [
            json!({"incidents": {"id": "A1"}}),
            json!({"incidents": "A1"}),
            json!({}),
            json!([{"id": "A1"}]),
            json!({"incidents": [], "metadata": "B1"}),
        ] {
            let err = service.import_incidents(&body).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{} gave {:?}", body, err);
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_classified() {
        let (service, _db) = service().await;
        let err = service
            .import_incidents(&json!({"incidents": [{"status": "open"}]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Store(_)), "unexpected: {:?}", err);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (service, _db) = service().await;

        service.create_session(&session_body("S1")).await.unwrap();
        let dup = service.create_session(&session_body("S1")).await.unwrap_err();
        assert!(matches!(dup, ApiError::Conflict(_)));

        let update = service
            .update_session("S1", &json!({"status": "processing", "successCount": 5}))
            .await
            .unwrap();
        assert_eq!(update.updated, Some(1));
        service
            .update_session("S1", &json!({"errorCount": 2}))
            .await
            .unwrap();

        service
            .append_errors("S1", &json!({"errors": [{"row": 2, "message": "bad site"}]}))
            .await
            .unwrap();

        let done = service
            .complete_session("S1", &json!({"successCount": 1, "errorCount": 1}))
            .await
            .unwrap();
        assert_eq!(done.status, SessionStatus::Partial);

        let session = service.get_session("S1").await.unwrap().session;
        assert_eq!(session.status, SessionStatus::Partial);
        assert_eq!(session.success_count, 1);
        assert_eq!(session.error_count, 1);
        assert_eq!(session.error_log.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_session_reports_zero() {
        let (service, _db) = service().await;
        let response = service
            .update_session("ghost", &json!({"successCount": 3}))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.updated, Some(0));
    }

    #[tokio::test]
    async fn test_update_to_terminal_status() {
        let (service, _db) = service().await;
        service
            .create_session(&json!({
                "id": "S9",
                "fileName": "c.xlsx",
                "fileHash": "H9",
                "dataType": "customer",
                "uploadTimestamp": 1
            }))
            .await
            .unwrap();

        let response = service
            .update_session("S9", &json!({"status": "failed", "errorCount": 4}))
            .await
            .unwrap();
        assert_eq!(response.updated, Some(1));

        let session = service.get_session("S9").await.unwrap().session;
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.status.is_terminal());
        assert_eq!(session.error_count, 4);
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_field() {
        let (service, _db) = service().await;
        service.create_session(&session_body("S1")).await.unwrap();

        let err = service
            .update_session("S1", &json!({"fileHash": "H2", "owner": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // Nothing from the rejected update was written
        let session = service.get_session("S1").await.unwrap().session;
        assert_eq!(session.file_hash, "H1");
    }

    #[tokio::test]
    async fn test_invalid_descriptor_is_validation() {
        let (service, _db) = service().await;
        let err = service
            .create_session(&json!({"id": "S1", "fileName": "f"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let (service, _db) = service().await;
        assert!(matches!(
            service.get_session("nope").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            service
                .complete_session("nope", &json!({"successCount": 0, "errorCount": 0}))
                .await
                .unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_list_filter_parsing() {
        let (service, _db) = service().await;
        service.create_session(&session_body("S1")).await.unwrap();

        let params: HashMap<String, String> =
            [("dataType".to_string(), "incidents".to_string())].into();
        assert_eq!(service.list_sessions(&params).await.unwrap().count, 1);

        let params: HashMap<String, String> =
            [("status".to_string(), "done".to_string())].into();
        assert!(matches!(
            service.list_sessions(&params).await.unwrap_err(),
            ApiError::Validation(_)
        ));
    }
}
