pub mod health;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::ranking::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api: Router<AppState> = Router::new()
        .route(
            "/api/v1/match",
            post(handlers::handle_match).get(handlers::handle_get_results),
        )
        .route(
            "/api/v1/match/candidates/:rank/summary",
            post(handlers::handle_summarize),
        )
        .route("/api/v1/usage", get(handlers::handle_usage))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        // outermost runs first: maintenance, then access key
        .route_layer(from_fn_with_state(state.clone(), middleware::access_gate))
        .route_layer(from_fn_with_state(state.clone(), middleware::maintenance_gate));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(api)
        .with_state(state)
}
