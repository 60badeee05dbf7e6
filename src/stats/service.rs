//! Statistics Service
//!
//! Reads operation counters from an injected data-access layer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::dal::DataAccessLayer;
use crate::error::Result;
use crate::models::PageRequest;
use crate::stats::OperationCounters;

// == Stats Service ==
#[derive(Clone)]
pub struct StatsService {
    dal: Arc<dyn DataAccessLayer>,
}

impl StatsService {
    pub fn new(dal: Arc<dyn DataAccessLayer>) -> Self {
        Self { dal }
    }

    /// Returns a snapshot of the counters at call time.
    ///
    /// The pagination hint is accepted for API compatibility; the result is
    /// always one aggregate snapshot.
    pub fn get_statistics(&self, page: Option<&PageRequest>) -> Result<OperationCounters> {
        if let Some(page) = page {
            debug!("Ignoring pagination hint for statistics: {:?}", page);
        }

        self.dal.get_counters().inspect_err(|e| {
            warn!("Statistics read failed: {}", e);
        })
    }
}
