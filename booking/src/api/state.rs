//! Application state shared across handlers.

use crate::engine::Engine;
use classbook_runtime::metrics::MetricsServer;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The booking engine
    pub engine: Arc<Engine>,
    /// Prometheus recorder, when the exporter is enabled
    pub metrics: Option<Arc<MetricsServer>>,
}

impl AppState {
    /// Create a new application state
    #[must_use]
    pub const fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            metrics: None,
        }
    }

    /// Serve `/metrics` from `server`
    #[must_use]
    pub fn with_metrics(mut self, server: Arc<MetricsServer>) -> Self {
        self.metrics = Some(server);
        self
    }
}
