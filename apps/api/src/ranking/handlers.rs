//! Axum route handlers for the Match API.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::resume::{CandidateResult, DocumentFormat, RankedResultSet, UploadedFile};
use crate::models::user::UserIdentity;
use crate::ranking::pipeline::UsageReport;
use crate::state::AppState;

/// Multipart field carrying the job description.
const JOB_DESCRIPTION_FIELD: &str = "job_description";
/// Multipart field name used for each resume file.
const RESUME_FIELD: &str = "resumes";

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub ranked_count: usize,
    pub results: RankedResultSet,
}

/// POST /api/v1/match
///
/// Multipart body: one `job_description` text field and one or more `resumes` files.
pub async fn handle_match(
    State(state): State<AppState>,
    user: UserIdentity,
    multipart: Multipart,
) -> Result<Json<MatchResponse>, AppError> {
    let (job_description, files) = read_match_form(multipart).await?;

    let results = state
        .pipeline
        .run_match(&user, &job_description, files)
        .await?;

    Ok(Json(MatchResponse {
        ranked_count: results.candidates.len(),
        results,
    }))
}

/// GET /api/v1/match
pub async fn handle_get_results(
    State(state): State<AppState>,
    user: UserIdentity,
) -> Result<Json<RankedResultSet>, AppError> {
    Ok(Json(state.pipeline.current_results(&user).await?))
}

/// POST /api/v1/match/candidates/:rank/summary
///
/// `rank` is 1-based, matching the order of the cached results.
pub async fn handle_summarize(
    State(state): State<AppState>,
    user: UserIdentity,
    Path(rank): Path<usize>,
) -> Result<Json<CandidateResult>, AppError> {
    Ok(Json(state.pipeline.summarize_candidate(&user, rank).await?))
}

/// GET /api/v1/usage
pub async fn handle_usage(
    State(state): State<AppState>,
    user: UserIdentity,
) -> Result<Json<UsageReport>, AppError> {
    Ok(Json(state.pipeline.usage(&user).await?))
}

async fn read_match_form(
    mut multipart: Multipart,
) -> Result<(String, Vec<UploadedFile>), AppError> {
    let mut job_description = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            JOB_DESCRIPTION_FIELD => {
                job_description = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Unreadable job description: {e}")))?;
            }
            RESUME_FIELD => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("resume-{}", files.len() + 1));
                let format = DocumentFormat::detect(&filename, field.content_type())
                    .ok_or_else(|| {
                        AppError::InvalidInput(format!(
                            "Unsupported file type for '{filename}'. Upload PDF, DOCX or TXT resumes."
                        ))
                    })?;
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read '{filename}': {e}")))?;

                files.push(UploadedFile {
                    filename,
                    format,
                    content,
                });
            }
            other => {
                tracing::debug!("Ignoring unexpected multipart field '{other}'");
            }
        }
    }

    Ok((job_description, files))
}
