use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{files, handlers, jobs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config, metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Capture jobs
        .route("/jobs", post(jobs::submit_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/cancel", post(jobs::cancel_job))
        .with_state(Arc::clone(&state))
        // Versioned capture configs and scripts
        .nest("/captureconfigs", files::router(state.config_store()))
        .nest("/scripts", files::router(state.script_store()))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            super::middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(super::middleware::metrics_middleware));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
