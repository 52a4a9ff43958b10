use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Interview control
        .route("/interviews", post(handlers::start_interview))
        .route(
            "/interviews/:interview_id/terminate",
            post(handlers::terminate_interview),
        )
        // Interview queries
        .route(
            "/interviews/:interview_id/status",
            get(handlers::get_interview_status),
        )
        .route(
            "/interviews/:interview_id/result",
            get(handlers::get_interview_result),
        )
        .route(
            "/interviews/:interview_id/log",
            get(handlers::get_interview_log),
        )
        // The onboarding and results pages are served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
