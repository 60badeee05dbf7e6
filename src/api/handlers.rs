//! API Handlers
//!
//! HTTP request handlers for the statistics and events endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::dal::{Event, EventRepository, InMemoryDataAccess};
use crate::error::{Result, StatsError};
use crate::models::{CreateEventRequest, EventPage, HealthResponse, PageRequest};
use crate::stats::{OperationCounters, StatsService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub stats: StatsService,
    pub events: Arc<EventRepository>,
}

impl AppState {
    pub fn new(stats: StatsService, events: Arc<EventRepository>) -> Self {
        Self { stats, events }
    }

    /// Wires both the statistics service and the repository onto one
    /// in-memory data-access layer.
    pub fn in_memory(dal: Arc<InMemoryDataAccess>) -> Self {
        let events = Arc::new(EventRepository::new(dal.clone()));
        Self::new(StatsService::new(dal), events)
    }
}

/// Handler for GET /api/statistics
///
/// Any query string is accepted, including malformed ones; none of it
/// affects the result.
pub async fn statistics_handler(
    State(state): State<AppState>,
    page: Option<Query<PageRequest>>,
) -> Result<Json<OperationCounters>> {
    let counters = state.stats.get_statistics(page.as_ref().map(|q| &q.0))?;
    Ok(Json(counters))
}

/// Handler for GET /api/events
///
/// A malformed query string is a 400 with the usual JSON error body.
pub async fn list_events_handler(
    State(state): State<AppState>,
    page: std::result::Result<Query<PageRequest>, QueryRejection>,
) -> Result<Json<EventPage>> {
    let Query(page) = page.map_err(|e| StatsError::InvalidRequest(e.body_text()))?;
    let (number, size) = (page.page(), page.size());
    let (content, total) = state.events.find_all(number, size)?;

    Ok(Json(EventPage::new(content, number, size, total)))
}

/// Handler for GET /api/events/:id
pub async fn get_event_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Event>> {
    state
        .events
        .find_by_id(id)?
        .map(Json)
        .ok_or_else(|| StatsError::NotFound(format!("event {}", id)))
}

/// Handler for POST /api/events
pub async fn create_event_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>)> {
    if let Some(error_msg) = req.validate() {
        return Err(StatsError::InvalidRequest(error_msg));
    }

    let event = state
        .events
        .save(req.title, req.date.unwrap_or_else(Utc::now))?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// Handler for DELETE /api/events/:id
pub async fn delete_event_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    if state.events.delete(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatsError::NotFound(format!("event {}", id)))
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
