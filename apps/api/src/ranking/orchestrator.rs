//! Ranking Orchestrator: extracts, scores and sorts a batch of resumes for one job description.
//!
//! Flow per file (bounded by `concurrency`):
//!   spawn_blocking(extract) → scorer.score → CandidateResult
//!
//! A file that cannot be read is skipped and logged; it never fails the batch.
//! A scorer failure does.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::resume::{CandidateResult, RankedResultSet, UploadedFile};
use crate::models::usage::UsageAction;
use crate::models::user::UserIdentity;
use crate::ranking::extraction::TextExtractor;
use crate::ranking::scoring::SimilarityScorer;
use crate::ranking::summary::SummaryGenerator;
use crate::usage_log::UsageLogger;

pub const DEFAULT_CONCURRENCY: usize = 4;

enum FileOutcome {
    Scored(CandidateResult),
    Unreadable { filename: String, reason: String },
}

pub struct RankingOrchestrator {
    extractor: Arc<dyn TextExtractor>,
    scorer: Arc<dyn SimilarityScorer>,
    summarizer: Arc<dyn SummaryGenerator>,
    usage: UsageLogger,
    concurrency: usize,
}

impl RankingOrchestrator {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        scorer: Arc<dyn SimilarityScorer>,
        summarizer: Arc<dyn SummaryGenerator>,
        usage: UsageLogger,
        concurrency: usize,
    ) -> Self {
        Self {
            extractor,
            scorer,
            summarizer,
            usage,
            concurrency: concurrency.max(1),
        }
    }

    /// Ranks `files` against `job_description`, best match first.
    ///
    /// Ties keep upload order. The result has one candidate per readable file.
    pub async fn rank(
        &self,
        user: &UserIdentity,
        job_description: &str,
        files: Vec<UploadedFile>,
    ) -> Result<RankedResultSet, AppError> {
        if job_description.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Job description cannot be empty".to_string(),
            ));
        }
        if files.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one resume is required".to_string(),
            ));
        }

        let file_count = files.len();
        let job: Arc<str> = Arc::from(job_description);
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, file) in files.into_iter().enumerate() {
            let extractor = self.extractor.clone();
            let scorer = self.scorer.clone();
            let job = job.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(AppError::Internal(e.into()))),
                };
                (index, process_file(extractor, scorer, &job, file).await)
            });
        }

        let mut outcomes = Vec::with_capacity(file_count);
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Ranking task failed: {e}")))?;
            outcomes.push((index, outcome?));
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut candidates = Vec::with_capacity(file_count);
        for (_, outcome) in outcomes {
            match outcome {
                FileOutcome::Scored(candidate) => candidates.push(candidate),
                FileOutcome::Unreadable { filename, reason } => {
                    warn!("Skipping unreadable resume '{filename}': {reason}");
                    let _ = self
                        .usage
                        .log_event(
                            UsageAction::ErrorExtraction,
                            user,
                            json!({ "filename": filename, "error": reason }),
                        )
                        .await;
                }
            }
        }

        // stable: equal scores keep upload order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        info!(
            "Ranked {}/{} resumes for user {user}",
            candidates.len(),
            file_count
        );

        Ok(RankedResultSet::new(job_description.to_string(), candidates))
    }

    /// Asks the summary backend why this resume fits the job. No retries.
    pub async fn summarize(
        &self,
        job_description: &str,
        resume_text: &str,
    ) -> Result<String, AppError> {
        self.summarizer.summarize(job_description, resume_text).await
    }
}

async fn process_file(
    extractor: Arc<dyn TextExtractor>,
    scorer: Arc<dyn SimilarityScorer>,
    job_description: &str,
    file: UploadedFile,
) -> Result<FileOutcome, AppError> {
    let filename = file.filename.clone();

    let text = match tokio::task::spawn_blocking(move || extractor.extract(&file)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Ok(FileOutcome::Unreadable {
                filename,
                reason: e.to_string(),
            })
        }
        Err(e) => {
            return Ok(FileOutcome::Unreadable {
                filename,
                reason: format!("extractor crashed: {e}"),
            })
        }
    };

    let raw = scorer.score(job_description, &text).await?;
    let score = if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        warn!("Scorer returned {raw} for '{filename}'; treating as no match");
        0.0
    };

    Ok(FileOutcome::Scored(CandidateResult {
        filename,
        resume_text: text,
        score,
        summary: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::clock::SystemClock;
    use crate::models::resume::DocumentFormat;
    use crate::ranking::extraction::DocumentTextExtractor;
    use crate::ranking::scoring::TermSimilarityScorer;
    use crate::ranking::testing::{
        text_file, FailingScorer, FixedScorer, PanickingExtractor, StubSummarizer,
    };
    use crate::usage_log::testing::MemorySink;
    use bytes::Bytes;

    const JD: &str = "Senior Python Developer, 5 years";

    fn orchestrator(
        extractor: Arc<dyn TextExtractor>,
        scorer: Arc<dyn SimilarityScorer>,
        concurrency: usize,
    ) -> (RankingOrchestrator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let usage = UsageLogger::new(sink.clone(), Arc::new(SystemClock));
        let orchestrator = RankingOrchestrator::new(
            extractor,
            scorer,
            Arc::new(StubSummarizer::ok("fits")),
            usage,
            concurrency,
        );
        (orchestrator, sink)
    }

    fn default_orchestrator() -> (RankingOrchestrator, Arc<MemorySink>) {
        orchestrator(
            Arc::new(DocumentTextExtractor::new()),
            Arc::new(TermSimilarityScorer::new()),
            DEFAULT_CONCURRENCY,
        )
    }

    fn user() -> UserIdentity {
        UserIdentity::parse("rank-tester").unwrap()
    }

    #[tokio::test]
    async fn test_better_match_ranks_first() {
        let (orchestrator, _) = default_orchestrator();
        let files = vec![
            text_file("chef.txt", "Pastry chef, French desserts, bakery management"),
            text_file(
                "dev.txt",
                "Senior Python developer, 5 years of Django and Flask",
            ),
        ];

        let ranked = orchestrator.rank(&user(), JD, files).await.unwrap();

        assert_eq!(ranked.candidates.len(), 2);
        assert_eq!(ranked.candidates[0].filename, "dev.txt");
        assert_eq!(ranked.candidates[1].filename, "chef.txt");
        assert!(ranked.candidates[0].score > ranked.candidates[1].score);
        for c in &ranked.candidates {
            assert!((0.0..=1.0).contains(&c.score));
            assert!(c.summary.is_none());
        }
        assert_eq!(ranked.job_description, JD);
        assert_eq!(ranked.revision, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_skipped_and_logged() {
        let (orchestrator, sink) = default_orchestrator();
        let files = vec![
            UploadedFile {
                filename: "broken.docx".to_string(),
                format: DocumentFormat::Docx,
                content: Bytes::from_static(b"definitely not a zip"),
            },
            text_file("good.txt", "Python developer"),
        ];

        let ranked = orchestrator.rank(&user(), JD, files).await.unwrap();

        assert_eq!(ranked.candidates.len(), 1);
        assert_eq!(ranked.candidates[0].filename, "good.txt");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, UsageAction::ErrorExtraction);
        assert_eq!(events[0].details["filename"], "broken.docx");
    }

    #[tokio::test]
    async fn test_all_files_unreadable_yields_empty_set() {
        let (orchestrator, sink) = default_orchestrator();
        let files = vec![text_file("blank.txt", "   "), text_file("empty.txt", "")];

        let ranked = orchestrator.rank(&user(), JD, files).await.unwrap();

        assert!(ranked.candidates.is_empty());
        assert_eq!(ranked.top_score(), 0.0);
        assert_eq!(sink.events().len(), 2);
    }

    #[tokio::test]
    async fn test_extractor_panic_is_soft_failure() {
        let (orchestrator, sink) = orchestrator(
            Arc::new(PanickingExtractor::on("boom.txt")),
            Arc::new(FixedScorer(0.5)),
            2,
        );
        let files = vec![text_file("boom.txt", "x"), text_file("ok.txt", "Python")];

        let ranked = orchestrator.rank(&user(), JD, files).await.unwrap();

        assert_eq!(ranked.candidates.len(), 1);
        assert_eq!(ranked.candidates[0].filename, "ok.txt");
        assert_eq!(sink.actions(), vec![UsageAction::ErrorExtraction]);
    }

    #[tokio::test]
    async fn test_ties_keep_upload_order() {
        for concurrency in [1, 3, 8] {
            let (orchestrator, _) = orchestrator(
                Arc::new(DocumentTextExtractor::new()),
                Arc::new(FixedScorer(0.42)),
                concurrency,
            );
            let files: Vec<_> = (0..6)
                .map(|i| text_file(&format!("r{i}.txt"), "same text"))
                .collect();

            let ranked = orchestrator.rank(&user(), JD, files).await.unwrap();

            let names: Vec<_> = ranked
                .candidates
                .iter()
                .map(|c| c.filename.as_str())
                .collect();
            assert_eq!(names, ["r0.txt", "r1.txt", "r2.txt", "r3.txt", "r4.txt", "r5.txt"]);
        }
    }

    #[tokio::test]
    async fn test_scores_are_clamped() {
        let (orchestrator, _) = orchestrator(
            Arc::new(DocumentTextExtractor::new()),
            Arc::new(FixedScorer(1.7)),
            1,
        );
        let ranked = orchestrator
            .rank(&user(), JD, vec![text_file("a.txt", "Python")])
            .await
            .unwrap();
        assert_eq!(ranked.candidates[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_non_finite_scores_rank_last_as_zero() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let (orchestrator, _) =
                orchestrator(Arc::new(DocumentTextExtractor::new()), Arc::new(FixedScorer(bad)), 1);
            let ranked = orchestrator
                .rank(&user(), JD, vec![text_file("odd.txt", "Python")])
                .await
                .unwrap();
            assert_eq!(ranked.candidates[0].score, 0.0);
            assert_eq!(
                serde_json::to_value(&ranked).unwrap()["candidates"][0]["score"],
                0.0
            );
        }
    }

    #[tokio::test]
    async fn test_scorer_failure_fails_the_batch() {
        let (orchestrator, _) = orchestrator(
            Arc::new(DocumentTextExtractor::new()),
            Arc::new(FailingScorer),
            2,
        );
        let err = orchestrator
            .rank(&user(), JD, vec![text_file("a.txt", "Python")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_blank_job_description_is_invalid_input() {
        let (orchestrator, _) = default_orchestrator();
        let err = orchestrator
            .rank(&user(), "  \n ", vec![text_file("a.txt", "Python")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_no_files_is_invalid_input() {
        let (orchestrator, _) = default_orchestrator();
        let err = orchestrator.rank(&user(), JD, vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_summarize_delegates_to_generator() {
        let (orchestrator, _) = default_orchestrator();
        let summary = orchestrator.summarize(JD, "Python").await.unwrap();
        assert_eq!(summary, "fits");
    }
}
