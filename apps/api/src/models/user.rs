use std::fmt;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Header carrying the caller's session key.
pub const SESSION_HEADER: &str = "x-session-id";

const MAX_IDENTITY_LEN: usize = 128;

/// Opaque, stable key for one interactive session.
///
/// How the key is derived (session cookie, account id, ...) is up to the caller;
/// the matcher only requires it to be stable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidInput(
                "Session identity cannot be empty".to_string(),
            ));
        }
        if raw.chars().count() > MAX_IDENTITY_LEN {
            return Err(AppError::InvalidInput(format!(
                "Session identity must be at most {MAX_IDENTITY_LEN} characters"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::InvalidInput(format!("Missing '{SESSION_HEADER}' header")))?;
        UserIdentity::parse(raw)
    }
}
