//! Upload session endpoints

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::parse_json_body;
use crate::error::ApiResult;
use crate::services::ingestion::{
    AppendErrorsResponse, CompleteResponse, SessionEnvelope, SessionListResponse,
    SessionResponse,
};
use crate::AppState;

/// POST /api/upload-sessions
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let body = parse_json_body(&body)?;
    let response = state.ingestion.create_session(&body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/upload-sessions?dataType=&status=&limit=
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<SessionListResponse>> {
    Ok(Json(state.ingestion.list_sessions(&params).await?))
}

/// GET /api/upload-sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionEnvelope>> {
    Ok(Json(state.ingestion.get_session(&id).await?))
}

/// PUT /api/upload-sessions/:id
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<SessionResponse>> {
    let body = parse_json_body(&body)?;
    Ok(Json(state.ingestion.update_session(&id, &body).await?))
}

/// POST /api/upload-sessions/:id/errors
pub async fn append_errors(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<AppendErrorsResponse>> {
    let body = parse_json_body(&body)?;
    Ok(Json(state.ingestion.append_errors(&id, &body).await?))
}

/// POST /api/upload-sessions/:id/complete
pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<CompleteResponse>> {
    let body = parse_json_body(&body)?;
    Ok(Json(state.ingestion.complete_session(&id, &body).await?))
}

pub fn upload_session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload-sessions", post(create_session).get(list_sessions))
        .route(
            "/api/upload-sessions/:id",
            get(get_session).put(update_session),
        )
        .route("/api/upload-sessions/:id/errors", post(append_errors))
        .route("/api/upload-sessions/:id/complete", post(complete_session))
}
