// Prompts for candidate fit summaries.

/// System prompt for fit summaries.
pub const FIT_SUMMARY_SYSTEM: &str = "You are an experienced technical recruiter. \
    You explain, in plain prose, why a candidate does or does not fit a role. \
    Base every statement on the resume provided. \
    Do NOT invent experience, employers, or credentials. \
    Do NOT use markdown headings or bullet points.";

/// Fit summary prompt. Both inputs are inserted verbatim in a single pass,
/// so placeholder-like text inside them is never substituted.
pub fn fit_summary_prompt(job_description: &str, resume_text: &str) -> String {
    format!(
        r#"Write a short fit summary (3-5 sentences) for this candidate.

Cover:
- the candidate's strongest matches against the job requirements
- notable gaps or missing requirements
- an overall verdict on fit

JOB DESCRIPTION:
{job_description}

CANDIDATE RESUME:
{resume_text}"#
    )
}
