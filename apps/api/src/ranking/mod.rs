// Resume ranking: text extraction, similarity scoring, fit summaries, and the
// request pipeline that meters them. All LLM calls go through llm_client.

pub mod extraction;
pub mod handlers;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod scoring;
pub mod session;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;
