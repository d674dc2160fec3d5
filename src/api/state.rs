//! Application State
//!
//! Shared state accessible by all API handlers.

use std::time::{Duration, Instant};

use crate::config::DatasourceKind;
use crate::query::DataSource;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Batch entry point for the configured backend
    pub datasource: DataSource,
    /// Backend reported by the readiness probe
    pub kind: DatasourceKind,
    /// Upper bound for one batch request
    pub request_timeout: Duration,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(datasource: DataSource, kind: DatasourceKind, request_timeout: Duration) -> Self {
        Self {
            datasource,
            kind,
            request_timeout,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
