//! Fit summaries: natural-language explanation of why a candidate fits a job description.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::llm_client::{LlmClient, LlmError};
use crate::ranking::prompts::{fit_summary_prompt, FIT_SUMMARY_SYSTEM};

/// Longest slice of either input sent to the model, in characters.
const MAX_INPUT_CHARS: usize = 12_000;

/// Pluggable summary backend.
///
/// Must report a missing credential as `AppError::MissingCredential` and every other
/// failure as `AppError::Generation`. Implementations must not retry.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn summarize(&self, job_description: &str, resume_text: &str)
        -> Result<String, AppError>;
}

/// Summary generator backed by Claude through `LlmClient`.
pub struct LlmSummaryGenerator {
    llm: LlmClient,
}

impl LlmSummaryGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SummaryGenerator for LlmSummaryGenerator {
    async fn summarize(
        &self,
        job_description: &str,
        resume_text: &str,
    ) -> Result<String, AppError> {
        let prompt = fit_summary_prompt(
            truncate_chars(job_description, MAX_INPUT_CHARS),
            truncate_chars(resume_text, MAX_INPUT_CHARS),
        );

        self.llm
            .complete(&prompt, FIT_SUMMARY_SYSTEM)
            .await
            .map_err(|e| match e {
                LlmError::MissingApiKey => AppError::MissingCredential,
                other => AppError::Generation(other.to_string()),
            })
    }
}

/// Cuts `s` to at most `max` characters without splitting a UTF-8 sequence.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
