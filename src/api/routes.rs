//! API Routes
//!
//! Configures the Axum router with all HTTP endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    create_event_handler, delete_event_handler, get_event_handler, health_handler,
    list_events_handler, statistics_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /api/statistics` - Data-access counters snapshot
/// - `GET /api/events` - Paged event listing
/// - `POST /api/events` - Create an event
/// - `GET /api/events/:id` - Fetch one event
/// - `DELETE /api/events/:id` - Delete one event
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/statistics", get(statistics_handler))
        .route(
            "/api/events",
            get(list_events_handler).post(create_event_handler),
        )
        .route(
            "/api/events/:id",
            get(get_event_handler).delete(delete_event_handler),
        )
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
