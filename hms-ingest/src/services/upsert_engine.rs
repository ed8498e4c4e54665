//! Upsert engine
//!
//! Writes normalized tuples with one set-based `INSERT ... ON CONFLICT(id) DO
//! UPDATE` per chunk. New keys insert a full row; existing keys only have the
//! kind's mutable columns and `updated_at` rewritten, so first-write provenance
//! survives re-imports.
//!
//! A batch is all-or-nothing. Batches wider than SQLite's bound-parameter limit
//! are split, and every chunk runs inside the same transaction.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::models::{FieldValue, NormalizedRecord, RecordKind};
use hms_common::{Error, Result};

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` since 3.32
pub const SQLITE_MAX_BIND_PARAMS: usize = 32766;

/// Upsert Engine
pub struct UpsertEngine {
    db: SqlitePool,
    max_bind_params: usize,
}

impl UpsertEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            max_bind_params: SQLITE_MAX_BIND_PARAMS,
        }
    }

    /// Override the per-statement parameter budget (smaller chunks)
    #[cfg(test)]
    pub(crate) fn with_max_bind_params(mut self, max_bind_params: usize) -> Self {
        self.max_bind_params = max_bind_params.max(1);
        self
    }

    /// Insert-or-update a batch, returning rows affected (inserts + updates)
    ///
    /// Store errors propagate unchanged and roll back the whole batch.
    pub async fn upsert(&self, kind: RecordKind, records: &[NormalizedRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let columns = kind.columns();
        if let Some(bad) = records
            .iter()
            .find(|r| r.kind != kind || r.values.len() != columns.len())
        {
            return Err(Error::Internal(format!(
                "{} record does not match the {} column layout ({} values for {} columns)",
                bad.kind,
                kind,
                bad.values.len(),
                columns.len()
            )));
        }

        let rows_per_chunk = (self.max_bind_params / columns.len()).max(1);
        let insert_head = format!(
            "INSERT INTO {} ({}) ",
            kind.table(),
            columns.iter().map(|c| c.column).collect::<Vec<_>>().join(", ")
        );
        let conflict_tail = conflict_clause(kind);

        let mut tx = self.db.begin().await?;
        let mut affected = 0u64;

        for chunk in records.chunks(rows_per_chunk) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(&insert_head);
            builder.push_values(chunk, |mut row, record| {
                for value in &record.values {
                    match value {
                        FieldValue::Null => row.push_bind(None::<String>),
                        FieldValue::Integer(i) => row.push_bind(*i),
                        FieldValue::Real(f) => row.push_bind(*f),
                        FieldValue::Text(s) => row.push_bind(s.clone()),
                    };
                }
            });
            builder.push(&conflict_tail);

            let result = builder.build().execute(&mut *tx).await?;
            affected += result.rows_affected();
        }

        tx.commit().await?;

        debug!(
            kind = %kind,
            records = records.len(),
            rows = affected,
            chunks = records.len().div_ceil(rows_per_chunk),
            "Upserted batch"
        );

        Ok(affected)
    }
}

fn conflict_clause(kind: RecordKind) -> String {
    let mut assignments: Vec<String> = kind
        .conflict_updates()
        .iter()
        .map(|col| format!("{col} = excluded.{col}"))
        .collect();
    assignments.push("updated_at = CURRENT_TIMESTAMP".to_string());

    format!(
        " ON CONFLICT({}) DO UPDATE SET {}",
        kind.key_column(),
        assignments.join(", ")
    )
}
