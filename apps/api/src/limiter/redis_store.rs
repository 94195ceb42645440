use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;
use uuid::Uuid;

use crate::limiter::store::{DailyCounter, RateLimitStore, StoreError, UsageReset, UserUsage};
use crate::models::user::UserIdentity;

/// Request records outlive the hourly window by a margin so a slow check still sees them.
const REQUESTS_TTL_SECS: i64 = 2 * 3600;
const DAILY_TTL_SECS: i64 = 2 * 86_400;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Limiter state in Redis, shared by every process pointing at the same server.
///
/// Layout per user:
/// - `{prefix}:requests:{user}` sorted set, score = request time in epoch millis
/// - `{prefix}:daily:{user}` hash with `date` and `count`
#[derive(Clone)]
pub struct RedisRateLimitStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisRateLimitStore {
    pub async fn connect(client: &redis::Client, prefix: &str) -> Result<Self, StoreError> {
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis rate limit store ready (prefix: {prefix})");
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn requests_key(&self, user: &UserIdentity) -> String {
        format!("{}:requests:{}", self.prefix, user)
    }

    fn daily_key(&self, user: &UserIdentity) -> String {
        format!("{}:daily:{}", self.prefix, user)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn get(&self, user: &UserIdentity) -> Result<UserUsage, StoreError> {
        let mut conn = self.conn.clone();
        let daily_key = self.daily_key(user);

        let entries: Vec<(String, f64)> = conn
            .zrange_withscores(self.requests_key(user), 0, -1)
            .await?;
        let daily: HashMap<String, String> = conn.hgetall(&daily_key).await?;

        let requests = entries
            .into_iter()
            .filter_map(|(_, score)| Utc.timestamp_millis_opt(score as i64).single())
            .collect();

        Ok(UserUsage {
            requests,
            daily: parse_daily(&daily_key, &daily)?,
        })
    }

    async fn append(
        &self,
        user: &UserIdentity,
        at: DateTime<Utc>,
        day: NaiveDate,
    ) -> Result<UserUsage, StoreError> {
        let mut conn = self.conn.clone();
        let requests_key = self.requests_key(user);
        let daily_key = self.daily_key(user);
        let day_str = day.format(DATE_FORMAT).to_string();

        let stored_date: Option<String> = conn.hget(&daily_key, "date").await?;
        let same_day = stored_date.as_deref() == Some(day_str.as_str());

        let millis = at.timestamp_millis();
        let member = format!("{millis}-{}", Uuid::new_v4());

        let mut pipe = redis::pipe();
        pipe.atomic()
            .zadd(&requests_key, member, millis)
            .ignore()
            .expire(&requests_key, REQUESTS_TTL_SECS)
            .ignore();
        if same_day {
            pipe.hincr(&daily_key, "count", 1).ignore();
        } else {
            pipe.hset_multiple(
                &daily_key,
                &[("date", day_str.clone()), ("count", "1".to_string())],
            )
            .ignore();
        }
        pipe.expire(&daily_key, DAILY_TTL_SECS).ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        self.get(user).await
    }

    async fn reset(&self, user: &UserIdentity, reset: UsageReset) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match reset {
            UsageReset::RequestsUpTo(cutoff) => {
                let _: () = conn
                    .zrembyscore(self.requests_key(user), "-inf", cutoff.timestamp_millis())
                    .await?;
            }
            // a missing hash already reads as a zero count
            UsageReset::DailyCounter(_) => {
                let _: () = conn.del(self.daily_key(user)).await?;
            }
        }
        Ok(())
    }
}

fn parse_daily(
    key: &str,
    fields: &HashMap<String, String>,
) -> Result<Option<DailyCounter>, StoreError> {
    let (Some(date), Some(count)) = (fields.get("date"), fields.get("count")) else {
        return Ok(None);
    };

    let corrupt = |value: &str| StoreError::Corrupt {
        key: key.to_string(),
        value: value.to_string(),
    };

    Ok(Some(DailyCounter {
        date: NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| corrupt(date))?,
        count: count.parse().map_err(|_| corrupt(count))?,
    }))
}
