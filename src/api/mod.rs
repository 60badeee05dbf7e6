//! API Module
//!
//! HTTP handlers and routing for the statistics REST API.
//!
//! # Endpoints
//! - `GET /api/statistics` - Data-access counters snapshot
//! - `GET|POST /api/events` - Event listing and creation
//! - `GET|DELETE /api/events/:id` - Single event access
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
