use std::sync::Arc;

use crate::config::Config;
use crate::ranking::pipeline::MatchPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Rate limiters, orchestrator and result cache behind one request flow.
    pub pipeline: Arc<MatchPipeline>,
}
