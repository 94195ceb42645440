//! Rate Limiter: per-user admission over a sliding one-hour window and a calendar-day counter.
//!
//! Both windows are independent and both must admit a request. Checks and `record` are
//! separate calls: callers check both windows, then record. Two requests from the same user
//! racing through the checks can both be recorded and overshoot the ceiling by the number
//! in flight; the limiter does not serialize them.

pub mod clock;
pub mod redis_store;
pub mod store;

use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{AppError, LimitWindow};
use crate::limiter::clock::Clock;
use crate::limiter::store::{RateLimitStore, StoreError, UsageReset};
use crate::models::user::UserIdentity;

const WINDOW_SECS: i64 = 3600;

/// Ceilings and the reference offset used to decide what "today" is.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub per_hour: u32,
    pub per_day: u32,
    pub day_offset: FixedOffset,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_hour: 5,
            per_day: 20,
            day_offset: Utc.fix(),
        }
    }
}

/// Outcome of a single window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub admitted: bool,
    pub count: u32,
    pub limit: u32,
}

pub struct RateLimiter {
    name: &'static str,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(
        name: &'static str,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        limits: RateLimits,
    ) -> Self {
        Self {
            name,
            store,
            clock,
            limits,
        }
    }

    /// Prunes records older than the window, then admits while the rest is under the ceiling.
    pub async fn check_hourly(&self, user: &UserIdentity) -> Result<Admission, StoreError> {
        let cutoff = self.clock.now() - Duration::seconds(WINDOW_SECS);
        let usage = self.store.get(user).await?;

        let count = usage.requests.iter().filter(|ts| **ts > cutoff).count() as u32;
        if count as usize != usage.requests.len() {
            self.store
                .reset(user, UsageReset::RequestsUpTo(cutoff))
                .await?;
        }

        let admission = Admission {
            admitted: count < self.limits.per_hour,
            count,
            limit: self.limits.per_hour,
        };
        if !admission.admitted {
            warn!(
                "User {user} exceeded {} hourly rate limit ({count}/{})",
                self.name, self.limits.per_hour
            );
        }
        Ok(admission)
    }

    /// Resets a counter left over from another day, then admits while under the daily ceiling.
    pub async fn check_daily(&self, user: &UserIdentity) -> Result<Admission, StoreError> {
        let today = self.today();
        let usage = self.store.get(user).await?;

        let count = match usage.daily {
            Some(counter) if counter.date == today => counter.count,
            Some(_) => {
                self.store
                    .reset(user, UsageReset::DailyCounter(today))
                    .await?;
                0
            }
            None => 0,
        };

        let admission = Admission {
            admitted: count < self.limits.per_day,
            count,
            limit: self.limits.per_day,
        };
        if !admission.admitted {
            warn!(
                "User {user} exceeded {} daily rate limit ({count}/{})",
                self.name, self.limits.per_day
            );
        }
        Ok(admission)
    }

    /// Records one request unconditionally. Call only after both checks admitted.
    pub async fn record(&self, user: &UserIdentity) -> Result<(), StoreError> {
        let now = self.clock.now();
        let usage = self.store.append(user, now, self.today()).await?;

        let daily = usage.daily.map(|d| d.count).unwrap_or(0);
        info!(
            "{} request recorded for user {user} | Hourly: {}/{} | Daily: {daily}/{}",
            self.name,
            usage.requests.len(),
            self.limits.per_hour,
            self.limits.per_day
        );
        Ok(())
    }

    /// Runs the hourly check, then the daily check, and reports the first window that rejects.
    pub async fn enforce(&self, user: &UserIdentity) -> Result<(), AppError> {
        for window in [LimitWindow::Hourly, LimitWindow::Daily] {
            let admission = match window {
                LimitWindow::Hourly => self.check_hourly(user).await?,
                LimitWindow::Daily => self.check_daily(user).await?,
            };
            if !admission.admitted {
                return Err(AppError::RateLimitExceeded {
                    window,
                    count: admission.count,
                    limit: admission.limit,
                });
            }
        }
        Ok(())
    }

    fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.limits.day_offset)
            .date_naive()
    }
}
