use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::user::UserIdentity;

/// Kinds of usage events written to the append-only usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageAction {
    MatchStarted,
    MatchCompleted,
    RateLimitExceeded,
    SummaryGenerated,
    ErrorMissingApiKey,
    ErrorGeneral,
    ErrorSummary,
    ErrorExtraction,
}

/// One line of the usage log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: UserIdentity,
    pub action: UsageAction,
    /// Free-form JSON object; `{}` when there is nothing to add.
    pub details: Value,
}
