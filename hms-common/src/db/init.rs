//! Database initialization
//!
//! Opens (or creates) the SQLite store and ensures the ingestion tables exist.
//! Table creation is idempotent; there is no versioned migration layer.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets session progress reads proceed while a bulk upsert is writing
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// pinned to a single connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all ingestion tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_incidents_table(pool).await?;
    create_customers_table(pool).await?;
    create_upload_sessions_table(pool).await?;

    info!("Database tables initialized (incidents, customers, upload_sessions)");
    Ok(())
}

/// Round-trip a trivial query to confirm the store is reachable
pub async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Create the incidents table
///
/// STRICT typing makes the store reject values that cannot be stored losslessly
/// in the declared column type (e.g. text in a duration column).
async fn create_incidents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incidents (
            id TEXT PRIMARY KEY NOT NULL,
            case_number TEXT,
            priority TEXT,
            site TEXT,
            ncal TEXT,
            status TEXT,
            level TEXT,
            ts TEXT,
            odp_bts TEXT,
            start_time TEXT,
            end_time TEXT,
            start_escalation_vendor TEXT,
            duration_min INTEGER,
            duration_vendor_min INTEGER,
            total_duration_pause_min INTEGER,
            total_duration_vendor_min INTEGER,
            start_pause1 TEXT,
            end_pause1 TEXT,
            start_pause2 TEXT,
            end_pause2 TEXT,
            problem TEXT,
            cause TEXT,
            last_action TEXT,
            note TEXT,
            disturbance_class TEXT,
            power_before REAL,
            power_after REAL,
            batch_id TEXT,
            file_name TEXT,
            file_hash TEXT,
            upload_session_id TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        ) STRICT
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_incidents_upload_session ON incidents(upload_session_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_incidents_file_hash ON incidents(file_hash)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the customers table
async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT,
            client_type TEXT,
            service TEXT,
            category TEXT,
            batch_id TEXT,
            file_name TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        ) STRICT
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the upload_sessions table
///
/// `error_log` holds a JSON array of structured error entries.
async fn create_upload_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_sessions (
            id TEXT PRIMARY KEY NOT NULL,
            file_name TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            file_size INTEGER,
            data_type TEXT NOT NULL CHECK (data_type IN ('incident', 'customer')),
            upload_timestamp INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed', 'failed', 'partial')),
            record_count INTEGER NOT NULL DEFAULT 0,
            success_count INTEGER NOT NULL DEFAULT 0,
            error_count INTEGER NOT NULL DEFAULT 0,
            error_log TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        ) STRICT
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_upload_sessions_timestamp ON upload_sessions(upload_timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
