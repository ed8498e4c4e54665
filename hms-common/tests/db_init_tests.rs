//! Tests for file-backed database initialization

use hms_common::db::init::{init_database, ping};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("ingest.db");

    assert!(!db_path.exists());

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());

    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ingest.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO customers (id, name) VALUES ('C1', 'Acme')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Reopening must keep existing rows
    let pool2 = init_database(&db_path).await.unwrap();
    let name: String = sqlx::query_scalar("SELECT name FROM customers WHERE id = 'C1'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(name, "Acme");
}

#[tokio::test]
async fn test_wal_mode_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("ingest.db")).await.unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_ping_fails_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("ingest.db")).await.unwrap();

    assert!(ping(&pool).await.is_ok());
    pool.close().await;
    assert!(ping(&pool).await.is_err());
}

#[tokio::test]
async fn test_session_status_check_constraint() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("ingest.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO upload_sessions (id, file_name, file_hash, data_type, upload_timestamp, status)
         VALUES ('S1', 'a.xlsx', 'h', 'incident', 0, 'exploded')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Unknown status should violate CHECK constraint");
}
