mod config;
mod errors;
mod limiter;
mod llm_client;
mod models;
mod ranking;
mod routes;
mod state;
mod usage_log;

use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, RateLimitBackend};
use crate::limiter::clock::{Clock, SystemClock};
use crate::limiter::redis_store::RedisRateLimitStore;
use crate::limiter::store::{InMemoryRateLimitStore, RateLimitStore};
use crate::limiter::{RateLimiter, RateLimits};
use crate::llm_client::LlmClient;
use crate::ranking::extraction::DocumentTextExtractor;
use crate::ranking::orchestrator::RankingOrchestrator;
use crate::ranking::pipeline::MatchPipeline;
use crate::ranking::scoring::TermSimilarityScorer;
use crate::ranking::session::ResultCache;
use crate::ranking::summary::LlmSummaryGenerator;
use crate::routes::build_router;
use crate::state::AppState;
use crate::usage_log::{JsonlFileSink, UsageLogger};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Matcher API v{}", env!("CARGO_PKG_VERSION"));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Limiter stores: one namespace per limiter so the two never share counters
    let (match_store, summary_store) = build_stores(&config).await?;

    let day_offset = FixedOffset::east_opt(config.daily_reset_utc_offset_hours * 3600)
        .context("DAILY_RESET_UTC_OFFSET_HOURS is out of range")?;
    let match_limiter = Arc::new(RateLimiter::new(
        "ranking",
        match_store,
        clock.clone(),
        RateLimits {
            per_hour: config.max_requests_per_hour,
            per_day: config.max_daily_requests,
            day_offset,
        },
    ));
    let summary_limiter = Arc::new(RateLimiter::new(
        "summary",
        summary_store,
        clock.clone(),
        RateLimits {
            per_hour: config.max_summaries_per_hour,
            per_day: config.max_daily_summaries,
            day_offset,
        },
    ));
    info!(
        "Rate limits: {}/hour, {}/day (summaries {}/hour, {}/day)",
        config.max_requests_per_hour,
        config.max_daily_requests,
        config.max_summaries_per_hour,
        config.max_daily_summaries
    );

    let usage = UsageLogger::new(
        Arc::new(JsonlFileSink::new(&config.usage_log_path)),
        clock.clone(),
    );
    info!("Usage log: {}", config.usage_log_path);

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    if llm.has_api_key() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        warn!("ANTHROPIC_API_KEY not set; candidate summaries will be unavailable");
    }
    if config.demo_mode {
        info!("Demo mode enabled: summaries are disabled");
    }

    let orchestrator = Arc::new(RankingOrchestrator::new(
        Arc::new(DocumentTextExtractor::new()),
        Arc::new(TermSimilarityScorer::new()),
        Arc::new(LlmSummaryGenerator::new(llm)),
        usage.clone(),
        config.rank_concurrency,
    ));

    let pipeline = MatchPipeline::new(
        match_limiter,
        summary_limiter,
        usage,
        orchestrator,
        Arc::new(ResultCache::new(
            clock.clone(),
            Duration::minutes(config.result_ttl_minutes),
        )),
        config.demo_mode,
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the ranking and summary limiter stores for the configured backend.
async fn build_stores(
    config: &Config,
) -> Result<(Arc<dyn RateLimitStore>, Arc<dyn RateLimitStore>)> {
    match &config.rate_limit_backend {
        RateLimitBackend::Memory => {
            info!("Rate limit backend: in-memory");
            Ok((
                Arc::new(InMemoryRateLimitStore::new()),
                Arc::new(InMemoryRateLimitStore::new()),
            ))
        }
        RateLimitBackend::Redis { url } => {
            let client = redis::Client::open(url.as_str())?;
            let ranking = RedisRateLimitStore::connect(&client, "matcher:ranking").await?;
            let summary = RedisRateLimitStore::connect(&client, "matcher:summary").await?;
            info!("Rate limit backend: redis");
            Ok((Arc::new(ranking), Arc::new(summary)))
        }
    }
}
