//! Data models for the ingestion service
//!
//! - Record kinds and their canonical column layout
//! - Batch provenance metadata
//! - Upload session lifecycle

pub mod batch;
pub mod record;
pub mod upload_session;

pub use batch::{BatchField, BatchMetadata};
pub use record::{ColumnSpec, FieldValue, NormalizedRecord, RecordKind};
pub use upload_session::{
    DataType, ErrorLogEntry, NewUploadSession, RecordRef, SessionFilter, SessionStatus,
    SessionTotals, UploadSession, timestamp_ms_from_json,
};
