//! API Route Configuration

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{admin_auth_middleware, logging_middleware, rate_limit_middleware};

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let api_v1 = Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        // Analysis
        .route("/analyze", post(handlers::analyze))
        // Denylist management
        .route("/denylist", get(handlers::get_denylist))
        .route("/denylist/tokens", post(handlers::add_denylist_token))
        .route("/denylist/tokens/:address", delete(handlers::remove_denylist_token))
        .route("/denylist/developers", post(handlers::add_denylist_developer))
        .route(
            "/denylist/developers/:address",
            delete(handlers::remove_denylist_developer),
        );

    let limiter_state = Arc::clone(&state);

    Router::new()
        .nest("/v1", api_v1)
        .route("/health", get(handlers::health_check))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), admin_auth_middleware))
        .with_state(state)
        // Bottom layer runs first
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(limiter_state, rate_limit_middleware))
}
