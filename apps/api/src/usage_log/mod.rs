//! Usage log: append-only record of what each session did.
//!
//! Writing is best effort. `UsageLogger::log_event` reports sink failures on the error log
//! and hands them back as a `Result`; request paths discard that result on purpose so a
//! broken log never aborts a match. Sinks are synchronous and always run on the blocking pool.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::limiter::clock::Clock;
use crate::models::usage::{UsageAction, UsageEvent};
use crate::models::user::UserIdentity;

#[derive(Debug, Error)]
pub enum UsageLogError {
    #[error("I/O error writing usage log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize usage event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Usage log writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Destination for usage events. `append` may block.
pub trait UsageSink: Send + Sync {
    fn append(&self, event: &UsageEvent) -> Result<(), UsageLogError>;
}

/// Appends one JSON object per line to a file.
///
/// The file is opened and closed per event. Each line goes out in a single `write_all`
/// on an `O_APPEND` handle, so concurrent writers interleave whole lines.
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UsageSink for JsonlFileSink {
    fn append(&self, event: &UsageEvent) -> Result<(), UsageLogError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct UsageLogger {
    sink: Arc<dyn UsageSink>,
    clock: Arc<dyn Clock>,
}

impl UsageLogger {
    pub fn new(sink: Arc<dyn UsageSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    /// Appends one event. `details` should be a JSON object; `Value::Null` is stored as `{}`.
    pub async fn log_event(
        &self,
        action: UsageAction,
        user: &UserIdentity,
        details: Value,
    ) -> Result<(), UsageLogError> {
        let event = UsageEvent {
            timestamp: self.clock.now(),
            user_id: user.clone(),
            action,
            details: match details {
                Value::Null => Value::Object(Default::default()),
                other => other,
            },
        };

        let sink = self.sink.clone();
        let written = tokio::task::spawn_blocking(move || sink.append(&event))
            .await
            .map_err(UsageLogError::from)
            .and_then(|result| result);

        match written {
            Ok(()) => {
                debug!("Usage event {:?} logged for user {user}", action);
                Ok(())
            }
            Err(e) => {
                error!("Failed to write usage log: {e}");
                Err(e)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenSink, MemorySink};
    use super::*;
    use crate::limiter::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 4, 2, 9, 30, 0).unwrap(),
        ))
    }

    fn user() -> UserIdentity {
        UserIdentity::parse("session-42").unwrap()
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage_logs.json");
        let logger = UsageLogger::new(Arc::new(JsonlFileSink::new(&path)), clock());

        logger
            .log_event(UsageAction::MatchStarted, &user(), json!({"resume_count": 2}))
            .await
            .unwrap();
        logger
            .log_event(UsageAction::MatchCompleted, &user(), Value::Null)
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["action"], "match_started");
        assert_eq!(first["user_id"], "session-42");
        assert_eq!(first["timestamp"], "2025-04-02T09:30:00Z");
        assert_eq!(first["details"]["resume_count"], 2);

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["details"], json!({}));
    }

    #[tokio::test]
    async fn test_jsonl_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("usage.json");
        let logger = UsageLogger::new(Arc::new(JsonlFileSink::new(path)), clock());

        let result = logger
            .log_event(UsageAction::ErrorGeneral, &user(), json!({}))
            .await;
        assert!(matches!(result, Err(UsageLogError::Io(_))));
    }

    #[tokio::test]
    async fn test_broken_sink_returns_error_without_panicking() {
        let logger = UsageLogger::new(Arc::new(BrokenSink), clock());
        assert!(logger
            .log_event(UsageAction::MatchStarted, &user(), json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = Arc::new(MemorySink::default());
        let logger = UsageLogger::new(sink.clone(), clock());

        let _ = logger
            .log_event(UsageAction::MatchStarted, &user(), json!({}))
            .await;
        let _ = logger
            .log_event(UsageAction::SummaryGenerated, &user(), json!({}))
            .await;

        assert_eq!(
            sink.actions(),
            vec![UsageAction::MatchStarted, UsageAction::SummaryGenerated]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_produce_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage_logs.json");
        let logger = UsageLogger::new(Arc::new(JsonlFileSink::new(&path)), clock());

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..50 {
            let logger = logger.clone();
            tasks.spawn(async move {
                let user = UserIdentity::parse(&format!("writer-{n}")).unwrap();
                logger
                    .log_event(UsageAction::MatchStarted, &user, json!({ "n": n }))
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 50);
        for line in lines {
            let event: Value = serde_json::from_str(line).unwrap();
            assert_eq!(event["action"], "match_started");
        }
    }
}
