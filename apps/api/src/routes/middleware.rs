//! Gates that run before any `/api` handler, in order: maintenance, then access key.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// Header carrying the shared access key.
pub const ACCESS_KEY_HEADER: &str = "x-access-key";

/// Short-circuits every request with 503 while maintenance mode is on.
pub async fn maintenance_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.config.maintenance_mode {
        return Err(AppError::Maintenance);
    }
    Ok(next.run(req).await)
}

/// Requires `x-access-key` to match `APP_PASSWORD` when one is configured.
pub async fn access_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.config.app_password.as_deref() {
        let provided = req
            .headers()
            .get(ACCESS_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Failed access attempt to {}", req.uri().path());
            return Err(AppError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}
