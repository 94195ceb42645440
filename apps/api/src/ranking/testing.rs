//! Collaborator doubles shared by the ranking tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::AppError;
use crate::models::resume::{DocumentFormat, UploadedFile};
use crate::ranking::extraction::{ExtractionError, TextExtractor};
use crate::ranking::scoring::SimilarityScorer;
use crate::ranking::summary::SummaryGenerator;

pub fn text_file(name: &str, text: &str) -> UploadedFile {
    UploadedFile {
        filename: name.to_string(),
        format: DocumentFormat::Txt,
        content: Bytes::from(text.to_string()),
    }
}

pub struct FixedScorer(pub f64);

#[async_trait]
impl SimilarityScorer for FixedScorer {
    async fn score(&self, _job: &str, _resume: &str) -> Result<f64, AppError> {
        Ok(self.0)
    }
}

pub struct FailingScorer;

#[async_trait]
impl SimilarityScorer for FailingScorer {
    async fn score(&self, _job: &str, _resume: &str) -> Result<f64, AppError> {
        Err(AppError::Internal(anyhow::anyhow!("embedding service down")))
    }
}

/// Reads files as UTF-8 but panics on one filename.
pub struct PanickingExtractor(String);

impl PanickingExtractor {
    pub fn on(filename: &str) -> Self {
        Self(filename.to_string())
    }
}

impl TextExtractor for PanickingExtractor {
    fn extract(&self, file: &UploadedFile) -> Result<String, ExtractionError> {
        if file.filename == self.0 {
            panic!("malformed document");
        }
        String::from_utf8(file.content.to_vec()).map_err(|_| ExtractionError::Encoding)
    }
}

#[derive(Clone, Copy)]
pub enum StubOutcome {
    Ok(&'static str),
    MissingCredential,
    Fail,
}

/// Summary generator with a canned outcome that counts its calls.
pub struct StubSummarizer {
    outcome: StubOutcome,
    calls: AtomicUsize,
}

impl StubSummarizer {
    pub fn ok(text: &'static str) -> Self {
        Self::with(StubOutcome::Ok(text))
    }

    pub fn with(outcome: StubOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryGenerator for StubSummarizer {
    async fn summarize(&self, _job: &str, _resume: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            StubOutcome::Ok(text) => Ok(text.to_string()),
            StubOutcome::MissingCredential => Err(AppError::MissingCredential),
            StubOutcome::Fail => Err(AppError::Generation("quota exhausted".to_string())),
        }
    }
}
