//! Response DTOs for the HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::dal::Event;

/// Response body for GET /api/events
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub content: Vec<Event>,
    /// Zero-based page index
    pub number: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl EventPage {
    pub fn new(content: Vec<Event>, number: usize, size: usize, total_elements: usize) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size)
        };
        Self {
            content,
            number,
            size,
            total_elements,
            total_pages,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_page_total_pages() {
        let page = EventPage::new(Vec::new(), 0, 20, 41);
        assert_eq!(page.total_pages, 3);

        let empty = EventPage::new(Vec::new(), 0, 20, 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_event_page_serialize() {
        let page = EventPage::new(Vec::new(), 1, 10, 15);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalElements"], 15);
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["number"], 1);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
