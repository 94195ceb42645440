//! Match pipeline: the request flow around the orchestrator.
//!
//! Ranking: enforce match limiter → validate → record → rank → cache → log.
//! Summaries: look up cached results → enforce summary limiter → summarize → record
//!            → compare-and-swap into the cache → log. Failed summaries are not recorded.
//!
//! Usage-log failures are discarded at every call site (`let _ = ...`).

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::limiter::{Admission, RateLimiter};
use crate::models::resume::{CandidateResult, RankedResultSet, UploadedFile};
use crate::models::usage::UsageAction;
use crate::models::user::UserIdentity;
use crate::ranking::orchestrator::RankingOrchestrator;
use crate::ranking::session::ResultCache;
use crate::usage_log::UsageLogger;

/// How many times a summary write is retried against newer revisions of the same run.
const MAX_SUMMARY_CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize)]
pub struct WindowUsage {
    pub hourly: Admission,
    pub daily: Admission,
}

#[derive(Debug, Serialize)]
pub struct UsageReport {
    pub ranking: WindowUsage,
    pub summaries: WindowUsage,
}

pub struct MatchPipeline {
    match_limiter: Arc<RateLimiter>,
    summary_limiter: Arc<RateLimiter>,
    usage: UsageLogger,
    orchestrator: Arc<RankingOrchestrator>,
    results: Arc<ResultCache>,
    demo_mode: bool,
}

impl MatchPipeline {
    pub fn new(
        match_limiter: Arc<RateLimiter>,
        summary_limiter: Arc<RateLimiter>,
        usage: UsageLogger,
        orchestrator: Arc<RankingOrchestrator>,
        results: Arc<ResultCache>,
        demo_mode: bool,
    ) -> Self {
        Self {
            match_limiter,
            summary_limiter,
            usage,
            orchestrator,
            results,
            demo_mode,
        }
    }

    /// Rate-limits, ranks and caches one batch of resumes for the session.
    pub async fn run_match(
        &self,
        user: &UserIdentity,
        job_description: &str,
        files: Vec<UploadedFile>,
    ) -> Result<RankedResultSet, AppError> {
        if let Err(e) = self.match_limiter.enforce(user).await {
            self.log_rejection(user, &e, "ranking").await;
            return Err(e);
        }

        if job_description.trim().is_empty() || files.is_empty() {
            return Err(AppError::InvalidInput(
                "Please provide both a job description and resumes".to_string(),
            ));
        }

        self.match_limiter.record(user).await?;
        let resume_count = files.len();
        let _ = self
            .usage
            .log_event(
                UsageAction::MatchStarted,
                user,
                json!({ "resume_count": resume_count }),
            )
            .await;

        match self.orchestrator.rank(user, job_description, files).await {
            Ok(results) => {
                self.results.replace(user, results.clone()).await;
                let _ = self
                    .usage
                    .log_event(
                        UsageAction::MatchCompleted,
                        user,
                        json!({
                            "resume_count": resume_count,
                            "ranked_count": results.candidates.len(),
                            "top_score": results.top_score(),
                        }),
                    )
                    .await;
                info!(
                    "Ranked {} candidates for user {user} (run {})",
                    results.candidates.len(),
                    results.run_id
                );
                Ok(results)
            }
            Err(e) => {
                self.log_failure(user, &e, UsageAction::ErrorGeneral).await;
                Err(e)
            }
        }
    }

    /// Returns the candidate at 1-based `rank` with its summary, generating it on first request.
    pub async fn summarize_candidate(
        &self,
        user: &UserIdentity,
        rank: usize,
    ) -> Result<CandidateResult, AppError> {
        if self.demo_mode {
            return Err(AppError::SummariesDisabled);
        }

        let index = rank
            .checked_sub(1)
            .ok_or_else(|| AppError::NotFound("Ranks start at 1".to_string()))?;
        let snapshot = self.current_results(user).await?;
        let candidate = snapshot
            .candidates
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No candidate at rank {rank}")))?;

        if candidate.summary.is_some() {
            return Ok(candidate);
        }

        if let Err(e) = self.summary_limiter.enforce(user).await {
            self.log_rejection(user, &e, "summary").await;
            return Err(e);
        }

        let summary = match self
            .orchestrator
            .summarize(&snapshot.job_description, &candidate.resume_text)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                self.log_failure(user, &e, UsageAction::ErrorSummary).await;
                return Err(e);
            }
        };
        // only a delivered summary counts against the quota
        self.summary_limiter.record(user).await?;

        let filename = candidate.filename.clone();
        let stored = self
            .store_summary(user, snapshot, index, summary.clone())
            .await;
        let _ = self
            .usage
            .log_event(
                UsageAction::SummaryGenerated,
                user,
                json!({ "filename": filename }),
            )
            .await;

        Ok(stored.unwrap_or(CandidateResult {
            summary: Some(summary),
            ..candidate
        }))
    }

    pub async fn current_results(&self, user: &UserIdentity) -> Result<RankedResultSet, AppError> {
        self.results
            .get(user)
            .await
            .ok_or_else(|| AppError::NotFound("No ranked results for this session".to_string()))
    }

    /// Current counts for both limiters. Checking prunes expired records as a side effect.
    pub async fn usage(&self, user: &UserIdentity) -> Result<UsageReport, AppError> {
        Ok(UsageReport {
            ranking: WindowUsage {
                hourly: self.match_limiter.check_hourly(user).await?,
                daily: self.match_limiter.check_daily(user).await?,
            },
            summaries: WindowUsage {
                hourly: self.summary_limiter.check_hourly(user).await?,
                daily: self.summary_limiter.check_daily(user).await?,
            },
        })
    }

    /// Writes the summary into the cached run and returns the candidate as stored.
    ///
    /// `None` when the run was replaced in the meantime; the summary is then dropped.
    async fn store_summary(
        &self,
        user: &UserIdentity,
        mut expected: RankedResultSet,
        index: usize,
        summary: String,
    ) -> Option<CandidateResult> {
        for _ in 0..MAX_SUMMARY_CAS_ATTEMPTS {
            let Some(next) = expected.with_summary(index, summary.clone()) else {
                // a concurrent request summarized this candidate first
                return expected.candidates.get(index).cloned();
            };
            let stored = next.candidates[index].clone();

            if self.results.compare_and_swap(user, &expected, next).await {
                return Some(stored);
            }

            match self.results.get(user).await {
                Some(current) if current.run_id == expected.run_id => expected = current,
                _ => {
                    warn!("Results for user {user} were replaced; dropping summary");
                    return None;
                }
            }
        }

        warn!("Gave up storing summary for user {user} after {MAX_SUMMARY_CAS_ATTEMPTS} attempts");
        None
    }

    async fn log_rejection(&self, user: &UserIdentity, error: &AppError, scope: &str) {
        match error {
            AppError::RateLimitExceeded { window, count, .. } => {
                let _ = self
                    .usage
                    .log_event(
                        UsageAction::RateLimitExceeded,
                        user,
                        json!({ "type": window, "count": count, "scope": scope }),
                    )
                    .await;
            }
            other => self.log_failure(user, other, UsageAction::ErrorGeneral).await,
        }
    }

    async fn log_failure(&self, user: &UserIdentity, error: &AppError, action: UsageAction) {
        let (action, details) = match error {
            AppError::MissingCredential => (UsageAction::ErrorMissingApiKey, json!({})),
            other => (action, json!({ "error": other.to_string() })),
        };
        let _ = self.usage.log_event(action, user, details).await;
    }
}
