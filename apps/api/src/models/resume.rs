use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document formats accepted for resume uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    /// Detects the format from the file extension, falling back to the declared MIME type.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Option<Self> {
        let by_extension = filename
            .rsplit_once('.')
            .and_then(|(_, ext)| match ext.to_ascii_lowercase().as_str() {
                "pdf" => Some(Self::Pdf),
                "docx" => Some(Self::Docx),
                "txt" => Some(Self::Txt),
                _ => None,
            });

        by_extension.or_else(|| match content_type? {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" => Some(Self::Txt),
            _ => None,
        })
    }
}

/// One uploaded resume, in upload order.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub format: DocumentFormat,
    pub content: Bytes,
}

/// A scored candidate. `summary` is the only field that changes after ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub filename: String,
    pub resume_text: String,
    /// 0.0 – 1.0
    pub score: f64,
    pub summary: Option<String>,
}

/// Candidates from one ranking run, sorted by descending score.
///
/// Owned by the session that produced it and replaced wholesale by the next run.
/// `revision` increases every time a summary is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResultSet {
    pub run_id: Uuid,
    pub revision: u64,
    pub job_description: String,
    pub candidates: Vec<CandidateResult>,
}

impl RankedResultSet {
    pub fn new(job_description: String, candidates: Vec<CandidateResult>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            revision: 0,
            job_description,
            candidates,
        }
    }

    pub fn top_score(&self) -> f64 {
        self.candidates.first().map(|c| c.score).unwrap_or(0.0)
    }

    /// Returns a copy with the summary of the candidate at `index` set.
    ///
    /// `None` when the index is out of range or that candidate already has a summary.
    pub fn with_summary(&self, index: usize, summary: String) -> Option<Self> {
        let current = self.candidates.get(index)?;
        if current.summary.is_some() {
            return None;
        }

        let mut candidates = self.candidates.clone();
        candidates[index] = CandidateResult {
            summary: Some(summary),
            ..current.clone()
        };

        Some(Self {
            run_id: self.run_id,
            revision: self.revision + 1,
            job_description: self.job_description.clone(),
            candidates,
        })
    }

    /// True when `other` is the same run at the same revision.
    pub fn same_version(&self, other: &Self) -> bool {
        self.run_id == other.run_id && self.revision == other.revision
    }
}
