//! hms-ingest library interface
//!
//! Bulk upload ingestion for the HMS helpdesk: incident and customer imports
//! keyed on their external ids, plus upload session tracking.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use hms_common::auth::{StaticTokenValidator, TokenValidator};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::services::IngestionService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (health checks only; services own their handles)
    pub db: SqlitePool,
    /// Ingestion facade
    pub ingestion: Arc<IngestionService>,
    /// Bearer token validator for `/api/*`
    pub validator: Arc<dyn TokenValidator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, validator: Arc<dyn TokenValidator>) -> Self {
        Self {
            ingestion: Arc::new(IngestionService::new(db.clone())),
            db,
            validator,
            startup_time: Utc::now(),
        }
    }

    /// State with authentication disabled
    pub fn without_auth(db: SqlitePool) -> Self {
        Self::new(db, Arc::new(StaticTokenValidator::default()))
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` passes the auth middleware.
/// Request bodies above `max_body_bytes` are refused with 413.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::bulk_routes())
        .merge(api::upload_session_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
