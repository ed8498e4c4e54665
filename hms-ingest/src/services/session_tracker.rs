//! Upload session tracker
//!
//! Lifecycle operations on `upload_sessions`: create, read, list, error log
//! accumulation and finalization. Sparse field updates live in
//! [`super::session_updater`].

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::models::{
    DataType, ErrorLogEntry, NewUploadSession, SessionFilter, SessionStatus, SessionTotals,
    UploadSession,
};
use hms_common::{Error, Result};

/// Default page size for session listings
pub const DEFAULT_LIST_LIMIT: u32 = 50;
/// Upper bound on a session listing
pub const MAX_LIST_LIMIT: u32 = 500;

const SESSION_COLUMNS: &str = "id, file_name, file_hash, file_size, data_type, upload_timestamp, \
     status, record_count, success_count, error_count, error_log, created_at";

/// Session Tracker
pub struct SessionTracker {
    db: SqlitePool,
}

impl SessionTracker {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new session
    ///
    /// Fails with [`Error::Conflict`] when the id is taken; the existing row is
    /// left untouched.
    pub async fn create(&self, session: &NewUploadSession) -> Result<()> {
        session.validate().map_err(Error::InvalidInput)?;

        let result = sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                id, file_name, file_hash, file_size, data_type,
                upload_timestamp, status, record_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.file_name)
        .bind(&session.file_hash)
        .bind(session.file_size)
        .bind(session.data_type.as_str())
        .bind(session.upload_timestamp)
        .bind(session.status.as_str())
        .bind(session.record_count)
        .execute(&self.db)
        .await
        .map_err(Error::Database);

        match result {
            Ok(_) => {
                info!(
                    session_id = %session.id,
                    data_type = session.data_type.as_str(),
                    records = session.record_count,
                    "Created upload session"
                );
                Ok(())
            }
            Err(e) if e.is_unique_violation() => Err(Error::Conflict(format!(
                "upload session {} already exists",
                session.id
            ))),
            Err(e) => Err(e),
        }
    }

    /// Load one session
    pub async fn get(&self, id: &str) -> Result<Option<UploadSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| session_from_row(&r)).transpose()
    }

    /// List sessions, newest upload first
    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<UploadSession>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE 1 = 1"
        ));
        if let Some(data_type) = filter.data_type {
            builder.push(" AND data_type = ").push_bind(data_type.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder
            .push(" ORDER BY upload_timestamp DESC, created_at DESC LIMIT ")
            .push_bind(i64::from(limit));

        let rows = builder.build().fetch_all(&self.db).await?;
        rows.iter().map(session_from_row).collect()
    }

    /// Append entries to a session's error log, returning how many were added
    ///
    /// Each entry is appended by its own statement; all of them share one
    /// transaction so a failure leaves the log as it was. The first statement in
    /// the transaction is the write itself, so a concurrent writer makes it wait
    /// on the busy timeout instead of failing a read-to-write upgrade.
    pub async fn append_errors(&self, id: &str, entries: &[ErrorLogEntry]) -> Result<usize> {
        if entries.is_empty() {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM upload_sessions WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.db)
                    .await?;
            return match exists {
                Some(_) => Ok(0),
                None => Err(Error::NotFound(format!("upload session {}", id))),
            };
        }

        let mut tx = self.db.begin().await?;

        for entry in entries {
            let encoded = serde_json::to_string(entry)
                .map_err(|e| Error::Internal(format!("Failed to serialize error entry: {}", e)))?;

            let result = sqlx::query(
                "UPDATE upload_sessions SET error_log = json_insert(error_log, '$[#]', json(?)) WHERE id = ?",
            )
            .bind(encoded)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            // Dropping the transaction rolls back; nothing was written anyway
            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("upload session {}", id)));
            }
        }

        tx.commit().await?;

        debug!(session_id = %id, appended = entries.len(), "Appended session errors");
        Ok(entries.len())
    }

    /// Record final tallies and move the session to its terminal status
    pub async fn finalize(&self, id: &str, totals: SessionTotals) -> Result<SessionStatus> {
        if totals.success_count < 0 || totals.error_count < 0 {
            return Err(Error::InvalidInput(format!(
                "counts must not be negative (successCount={}, errorCount={})",
                totals.success_count, totals.error_count
            )));
        }

        let status = totals.terminal_status();

        let result = sqlx::query(
            "UPDATE upload_sessions SET success_count = ?, error_count = ?, status = ? WHERE id = ?",
        )
        .bind(totals.success_count)
        .bind(totals.error_count)
        .bind(status.as_str())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("upload session {}", id)));
        }

        info!(
            session_id = %id,
            status = status.as_str(),
            success = totals.success_count,
            errors = totals.error_count,
            "Finalized upload session"
        );

        Ok(status)
    }
}

fn session_from_row(row: &SqliteRow) -> Result<UploadSession> {
    let data_type: String = row.get("data_type");
    let data_type = DataType::parse(&data_type)
        .ok_or_else(|| Error::Internal(format!("Unknown stored data_type: {}", data_type)))?;

    let status: String = row.get("status");
    let status = SessionStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown stored status: {}", status)))?;

    let error_log: String = row.get("error_log");
    let error_log: Vec<ErrorLogEntry> = serde_json::from_str(&error_log)
        .map_err(|e| Error::Internal(format!("Failed to deserialize error_log: {}", e)))?;

    Ok(UploadSession {
        id: row.get("id"),
        file_name: row.get("file_name"),
        file_hash: row.get("file_hash"),
        file_size: row.get("file_size"),
        data_type,
        upload_timestamp: row.get("upload_timestamp"),
        status,
        record_count: row.get("record_count"),
        success_count: row.get("success_count"),
        error_count: row.get("error_count"),
        error_log,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordRef;
    use hms_common::db::init_memory_database;

    fn descriptor(id: &str, timestamp: i64) -> NewUploadSession {
        NewUploadSession {
            id: id.to_string(),
            file_name: "incidents.xlsx".to_string(),
            file_hash: "H1".to_string(),
            data_type: DataType::Incident,
            upload_timestamp: timestamp,
            status: SessionStatus::Pending,
            record_count: 120,
            file_size: Some(4096),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        tracker.create(&descriptor("S1", 1_700_000_000_000)).await.unwrap();

        let session = tracker.get("S1").await.unwrap().unwrap();
        assert_eq!(session.file_name, "incidents.xlsx");
        assert_eq!(session.file_size, Some(4096));
        assert_eq!(session.data_type, DataType::Incident);
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.record_count, 120);
        assert_eq!(session.success_count, 0);
        assert!(session.error_log.is_empty());

        assert!(tracker.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts_and_keeps_first() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        tracker.create(&descriptor("S1", 1)).await.unwrap();

        let mut second = descriptor("S1", 2);
        second.file_name = "other.xlsx".to_string();
        second.record_count = 5;

        let err = tracker.create(&second).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "unexpected error: {:?}", err);

        let session = tracker.get("S1").await.unwrap().unwrap();
        assert_eq!(session.file_name, "incidents.xlsx");
        assert_eq!(session.upload_timestamp, 1);
        assert_eq!(session.record_count, 120);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_descriptor() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        let mut session = descriptor("S1", 1);
        session.record_count = -3;

        let err = tracker.create(&session).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(tracker.get("S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        tracker.create(&descriptor("old", 100)).await.unwrap();
        tracker.create(&descriptor("new", 300)).await.unwrap();
        let mut customer = descriptor("cust", 200);
        customer.data_type = DataType::Customer;
        tracker.create(&customer).await.unwrap();

        let all = tracker.list(&SessionFilter::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "cust", "old"]);

        let incidents = tracker
            .list(&SessionFilter {
                data_type: Some(DataType::Incident),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(incidents.len(), 2);

        let limited = tracker
            .list(&SessionFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "new");

        let completed_customers = tracker
            .list(&SessionFilter {
                data_type: Some(DataType::Customer),
                status: Some(SessionStatus::Completed),
                limit: None,
            })
            .await
            .unwrap();
        assert!(completed_customers.is_empty());
    }

    #[tokio::test]
    async fn test_append_errors_preserves_order() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        tracker.create(&descriptor("S1", 1)).await.unwrap();

        let first = vec![ErrorLogEntry::new(RecordRef::Row(4), "missing id")];
        let second = vec![
            ErrorLogEntry::new(RecordRef::Id("A9".to_string()), "bad date"),
            ErrorLogEntry::new(RecordRef::Row(11), "duplicate"),
        ];
        assert_eq!(tracker.append_errors("S1", &first).await.unwrap(), 1);
        assert_eq!(tracker.append_errors("S1", &second).await.unwrap(), 2);

        let session = tracker.get("S1").await.unwrap().unwrap();
        let messages: Vec<_> = session.error_log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["missing id", "bad date", "duplicate"]);
        assert_eq!(session.error_log[1].record, RecordRef::Id("A9".to_string()));
    }

    #[tokio::test]
    async fn test_append_errors_unknown_session() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        let err = tracker
            .append_errors("nope", &[ErrorLogEntry::new(RecordRef::Row(1), "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_append_no_errors() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        tracker.create(&descriptor("S1", 1)).await.unwrap();

        assert_eq!(tracker.append_errors("S1", &[]).await.unwrap(), 0);
        assert!(matches!(
            tracker.append_errors("nope", &[]).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = hms_common::db::init_database(&dir.path().join("ingest.db"))
            .await
            .unwrap();
        let tracker = std::sync::Arc::new(SessionTracker::new(db.clone()));
        tracker.create(&descriptor("S1", 1)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..24i64 {
            let tracker = tracker.clone();
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    let entry = ErrorLogEntry::new(RecordRef::Row(i), format!("row {} rejected", i));
                    tracker.append_errors("S1", &[entry]).await.map(|_| ())
                } else {
                    sqlx::query("UPDATE upload_sessions SET success_count = ? WHERE id = 'S1'")
                        .bind(i)
                        .execute(&db)
                        .await
                        .map(|_| ())
                        .map_err(Error::from)
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let session = tracker.get("S1").await.unwrap().unwrap();
        assert_eq!(session.error_log.len(), 12);
        db.close().await;
    }

    #[tokio::test]
    async fn test_finalize_derives_terminal_status() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        tracker.create(&descriptor("S1", 1)).await.unwrap();

        let status = tracker
            .finalize(
                "S1",
                SessionTotals {
                    success_count: 118,
                    error_count: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(status, SessionStatus::Partial);

        let session = tracker.get("S1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Partial);
        assert_eq!(session.success_count, 118);
        assert_eq!(session.error_count, 2);
    }

    #[tokio::test]
    async fn test_finalize_unknown_session() {
        let tracker = SessionTracker::new(init_memory_database().await.unwrap());
        let totals = SessionTotals {
            success_count: 1,
            error_count: 0,
        };
        assert!(matches!(
            tracker.finalize("nope", totals).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
