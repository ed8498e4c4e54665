//! HTTP API handlers
//!
//! Thin axum adapters over [`crate::services::IngestionService`]. Bodies are
//! read as raw bytes and parsed here so malformed JSON lands in the same error
//! envelope as every other validation failure.

pub mod auth;
pub mod bulk;
pub mod health;
pub mod upload_sessions;

pub use auth::auth_middleware;
pub use bulk::bulk_routes;
pub use health::health_routes;
pub use upload_sessions::upload_session_routes;

use axum::body::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, ApiResult};

/// Parse a request body as JSON
pub(crate) fn parse_json_body(body: &Bytes) -> ApiResult<Value> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, bytes = body.len(), "Rejected malformed JSON body");
        ApiError::Validation(format!("malformed JSON body: {}", e))
    })
}
