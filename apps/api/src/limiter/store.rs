//! Storage seam for limiter state.
//!
//! The limiter only talks to `RateLimitStore`; the in-memory store is the default
//! and `RedisRateLimitStore` shares counters across processes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::user::UserIdentity;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt stored value for {key}: {value}")]
    Corrupt { key: String, value: String },
}

/// Requests made on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCounter {
    pub date: NaiveDate,
    pub count: u32,
}

/// Everything the limiter knows about one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUsage {
    /// Admitted request timestamps in arrival order.
    pub requests: Vec<DateTime<Utc>>,
    pub daily: Option<DailyCounter>,
}

/// What a `reset` clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageReset {
    /// Drop request records at or before the cutoff.
    RequestsUpTo(DateTime<Utc>),
    /// Clear a daily counter left over from a day other than this one.
    DailyCounter(NaiveDate),
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Current usage; a user never seen before has empty usage.
    async fn get(&self, user: &UserIdentity) -> Result<UserUsage, StoreError>;

    /// Appends a request at `at` and bumps the counter for `day`, starting a fresh
    /// counter when the stored one belongs to another day. Returns the usage after the append.
    async fn append(
        &self,
        user: &UserIdentity,
        at: DateTime<Utc>,
        day: NaiveDate,
    ) -> Result<UserUsage, StoreError>;

    async fn reset(&self, user: &UserIdentity, reset: UsageReset) -> Result<(), StoreError>;
}

/// Process-local store. Restarting the process clears every counter.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    users: Mutex<HashMap<UserIdentity, UserUsage>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn tracked_users(&self) -> usize {
        self.users.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, user: &UserIdentity) -> Result<UserUsage, StoreError> {
        let users = self.users.lock().await;
        Ok(users.get(user).cloned().unwrap_or_default())
    }

    async fn append(
        &self,
        user: &UserIdentity,
        at: DateTime<Utc>,
        day: NaiveDate,
    ) -> Result<UserUsage, StoreError> {
        let mut users = self.users.lock().await;
        let usage = users.entry(user.clone()).or_default();

        usage.requests.push(at);
        usage.daily = Some(match usage.daily {
            Some(counter) if counter.date == day => DailyCounter {
                date: day,
                count: counter.count + 1,
            },
            _ => DailyCounter {
                date: day,
                count: 1,
            },
        });

        Ok(usage.clone())
    }

    async fn reset(&self, user: &UserIdentity, reset: UsageReset) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        let Some(usage) = users.get_mut(user) else {
            return Ok(());
        };

        match reset {
            UsageReset::RequestsUpTo(cutoff) => usage.requests.retain(|ts| *ts > cutoff),
            UsageReset::DailyCounter(day) => {
                if usage.daily.is_some_and(|counter| counter.date != day) {
                    usage.daily = None;
                }
            }
        }

        // nothing left that differs from a user never seen
        if usage.requests.is_empty() && usage.daily.is_none() {
            users.remove(user);
        }

        Ok(())
    }
}
