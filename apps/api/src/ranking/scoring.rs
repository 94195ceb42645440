//! Similarity scoring: pluggable, trait-based scorer that measures a resume against a JD.
//!
//! Default: `TermSimilarityScorer` (pure-Rust, fast, deterministic, fully testable).
//!
//! `RankingOrchestrator` holds an `Arc<dyn SimilarityScorer>`, so an embedding-backed
//! scorer can be swapped in at startup without touching callers.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use crate::errors::AppError;

/// The scorer trait. Scores are in [0, 1], higher is a better fit, and identical
/// inputs must give identical scores within a process.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn score(&self, job_description: &str, resume_text: &str) -> Result<f64, AppError>;
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "our", "that", "the", "their", "this", "to", "we", "will",
    "with", "you", "your",
];

/// Cosine similarity of sublinear term-frequency vectors.
///
/// Algorithm:
/// 1. Lower-case, split on anything that is not alphanumeric, `+` or `#` (keeps "c++", "c#")
/// 2. Drop stop words and single letters; digits are kept ("5 years")
/// 3. Weight each term by 1 + ln(tf)
/// 4. score = cos(jd, resume), clamped to [0, 1]
///
/// Terms live in ordered maps so the floating-point sums run in the same order every time.
pub struct TermSimilarityScorer {
    stop_words: HashSet<&'static str>,
}

impl TermSimilarityScorer {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn term_weights(&self, text: &str) -> BTreeMap<String, f64> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
            .filter(|t| !t.is_empty())
        {
            let is_single_letter =
                token.chars().count() == 1 && token.chars().all(|c| c.is_alphabetic());
            if is_single_letter || self.stop_words.contains(token) {
                continue;
            }
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(term, tf)| (term, 1.0 + (tf as f64).ln()))
            .collect()
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = self.term_weights(a);
        let b = self.term_weights(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
            .sum();
        let norm = |v: &BTreeMap<String, f64>| v.values().map(|w| w * w).sum::<f64>().sqrt();

        (dot / (norm(&a) * norm(&b))).clamp(0.0, 1.0)
    }
}

impl Default for TermSimilarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityScorer for TermSimilarityScorer {
    async fn score(&self, job_description: &str, resume_text: &str) -> Result<f64, AppError> {
        Ok(self.similarity(job_description, resume_text))
    }
}
