//! Bulk import endpoints
//!
//! POST /api/incidents/bulk  `{"incidents": [...], "metadata": {...}}`
//! POST /api/customers/bulk  `{"customers": [...], "metadata": {...}}`

use axum::{body::Bytes, extract::State, routing::post, Json, Router};

use super::parse_json_body;
use crate::error::ApiResult;
use crate::services::ingestion::ImportResponse;
use crate::AppState;

/// POST /api/incidents/bulk
pub async fn import_incidents(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ImportResponse>> {
    let body = parse_json_body(&body)?;
    let response = state.ingestion.import_incidents(&body).await?;
    Ok(Json(response))
}

/// POST /api/customers/bulk
pub async fn import_customers(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ImportResponse>> {
    let body = parse_json_body(&body)?;
    let response = state.ingestion.import_customers(&body).await?;
    Ok(Json(response))
}

pub fn bulk_routes() -> Router<AppState> {
    Router::new()
        .route("/api/incidents/bulk", post(import_incidents))
        .route("/api/customers/bulk", post(import_customers))
}
