//! Request DTOs for the HTTP API
//!
//! Defines the structure of incoming query strings and request bodies.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Largest page size served by the events listing
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when none is given
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Maximum allowed event title length
pub const MAX_TITLE_LENGTH: usize = 256;

/// Pagination hint (`?page=&size=&sort=`)
///
/// `page` is zero-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub sort: Option<String>,
}

impl PageRequest {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(0)
    }

    /// Requested size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn size(&self) -> usize {
        self.size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Request body for POST /api/events
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    /// Defaults to the time of the request
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl CreateEventRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.title.trim().is_empty() {
            return Some("Title cannot be empty".to_string());
        }
        if self.title.len() > MAX_TITLE_LENGTH {
            return Some(format!(
                "Title exceeds maximum length of {} characters",
                MAX_TITLE_LENGTH
            ));
        }
        None
    }
}
