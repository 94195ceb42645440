use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::limiter::store::StoreError;

/// Which limiter window rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitWindow {
    Hourly,
    Daily,
}

impl fmt::Display for LimitWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitWindow::Hourly => f.write_str("hourly"),
            LimitWindow::Daily => f.write_str("daily"),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{window} rate limit exceeded ({count}/{limit})")]
    RateLimitExceeded {
        window: LimitWindow,
        count: u32,
        limit: u32,
    },

    #[error("Summary generation credential is not configured")]
    MissingCredential,

    #[error("Summary generation failed: {0}")]
    Generation(String),

    #[error("AI summaries are disabled in demo mode")]
    SummariesDisabled,

    #[error("Service is under maintenance")]
    Maintenance,

    #[error("Rate limit store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, code, message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "A valid access key is required".to_string(),
            ),
            AppError::RateLimitExceeded {
                window,
                count,
                limit,
            } => {
                details = Some(json!({ "window": window, "count": count, "limit": limit }));
                match window {
                    LimitWindow::Hourly => (
                        StatusCode::TOO_MANY_REQUESTS,
                        "HOURLY_RATE_LIMIT_EXCEEDED",
                        format!(
                            "You've used {count}/{limit} requests this hour. \
                             The limit resets within an hour of your first request."
                        ),
                    ),
                    LimitWindow::Daily => (
                        StatusCode::TOO_MANY_REQUESTS,
                        "DAILY_RATE_LIMIT_EXCEEDED",
                        format!(
                            "You've used {count}/{limit} requests today. \
                             The limit resets at midnight."
                        ),
                    ),
                }
            }
            AppError::MissingCredential => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MISSING_CREDENTIAL",
                "The AI API key is not configured. Please contact the administrator.".to_string(),
            ),
            AppError::Generation(msg) => {
                tracing::error!("Generation error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_ERROR",
                    "Failed to generate summary. Please try again.".to_string(),
                )
            }
            AppError::SummariesDisabled => (
                StatusCode::FORBIDDEN,
                "SUMMARIES_DISABLED",
                "AI summaries are disabled in demo mode".to_string(),
            ),
            AppError::Maintenance => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MAINTENANCE",
                "The application is temporarily unavailable for updates. Please check back later."
                    .to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Rate limit store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A rate limiting error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_maps_to_429() {
        let response = AppError::RateLimitExceeded {
            window: LimitWindow::Daily,
            count: 20,
            limit: 20,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_missing_credential_is_distinct_from_generation() {
        assert_eq!(
            AppError::MissingCredential.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Generation("timeout".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_window_display() {
        let err = AppError::RateLimitExceeded {
            window: LimitWindow::Hourly,
            count: 5,
            limit: 5,
        };
        assert_eq!(err.to_string(), "hourly rate limit exceeded (5/5)");
    }
}
