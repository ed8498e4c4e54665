//! Authentication middleware
//!
//! Resolves `Authorization: Bearer <token>` through the configured
//! [`TokenValidator`](hms_common::auth::TokenValidator) and rejects the request
//! with 401 before any handler runs. The resulting identity is stored in the
//! request extensions.
//!
//! Applied to `/api/*` only; `/health` stays public.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use hms_common::auth::parse_bearer;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer);

    let identity = state.validator.validate(token).map_err(|e| {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            error = %e,
            "Rejected unauthenticated request"
        );
        ApiError::from(e)
    })?;

    debug!(%identity, path = %request.uri().path(), "Authenticated request");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
