use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::ranking::orchestrator::DEFAULT_CONCURRENCY;

/// Where limiter state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory,
    Redis { url: String },
}

/// Application configuration loaded from environment variables.
/// Startup fails if a value is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Optional: summaries fail with a missing-credential error without it.
    pub anthropic_api_key: Option<String>,
    /// Optional access key. When set, `/api` routes require a matching `x-access-key` header.
    pub app_password: Option<String>,
    /// Emergency kill switch: every `/api` route answers 503.
    pub maintenance_mode: bool,
    /// Ranking only; AI summaries are refused.
    pub demo_mode: bool,
    pub max_requests_per_hour: u32,
    pub max_daily_requests: u32,
    pub max_summaries_per_hour: u32,
    pub max_daily_summaries: u32,
    /// Offset from UTC, in hours, at which daily counters roll over.
    pub daily_reset_utc_offset_hours: i32,
    pub usage_log_path: String,
    pub rate_limit_backend: RateLimitBackend,
    pub rank_concurrency: usize,
    pub max_upload_bytes: usize,
    /// Idle minutes after which a session's ranked results are dropped.
    pub result_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let rate_limit_backend = match optional_env("RATE_LIMIT_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => RateLimitBackend::Memory,
            "redis" => RateLimitBackend::Redis {
                url: require_env("REDIS_URL")?,
            },
            other => bail!("RATE_LIMIT_BACKEND must be 'memory' or 'redis', got '{other}'"),
        };

        let daily_reset_utc_offset_hours: i32 = parse_env("DAILY_RESET_UTC_OFFSET_HOURS", 0)?;
        if !(-23..=23).contains(&daily_reset_utc_offset_hours) {
            bail!("DAILY_RESET_UTC_OFFSET_HOURS must be between -23 and 23");
        }

        let result_ttl_minutes: i64 = parse_env("RESULT_TTL_MINUTES", 120)?;
        if result_ttl_minutes <= 0 {
            bail!("RESULT_TTL_MINUTES must be positive");
        }

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            app_password: optional_env("APP_PASSWORD"),
            maintenance_mode: flag_env("MAINTENANCE_MODE"),
            demo_mode: flag_env("DEMO_MODE"),
            max_requests_per_hour: parse_env("MAX_REQUESTS_PER_HOUR", 5)?,
            max_daily_requests: parse_env("MAX_DAILY_REQUESTS", 20)?,
            max_summaries_per_hour: parse_env("MAX_SUMMARIES_PER_HOUR", 30)?,
            max_daily_summaries: parse_env("MAX_DAILY_SUMMARIES", 100)?,
            daily_reset_utc_offset_hours,
            usage_log_path: optional_env("USAGE_LOG_PATH")
                .unwrap_or_else(|| "usage_logs.json".to_string()),
            rate_limit_backend,
            rank_concurrency: parse_env("RANK_CONCURRENCY", DEFAULT_CONCURRENCY)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
            result_ttl_minutes,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag_env(key: &str) -> bool {
    optional_env(key).is_some_and(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_only_accepts_true() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("yes"));
    }

    #[test]
    fn test_parse_env_default_and_error() {
        // keys unique to this test so parallel tests don't collide
        std::env::remove_var("MATCHER_TEST_UNSET_PORT");
        assert_eq!(parse_env("MATCHER_TEST_UNSET_PORT", 8080u16).unwrap(), 8080);

        std::env::set_var("MATCHER_TEST_BAD_PORT", "eighty");
        assert!(parse_env::<u16>("MATCHER_TEST_BAD_PORT", 8080).is_err());

        std::env::set_var("MATCHER_TEST_GOOD_LIMIT", " 12 ");
        assert_eq!(parse_env::<u32>("MATCHER_TEST_GOOD_LIMIT", 5).unwrap(), 12);
    }
}
