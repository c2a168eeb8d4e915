//! Prometheus metrics for the runtime.
//!
//! Covers the keyed store (commands, reductions, effects), journal traffic and
//! retry behaviour. Domain crates register their own business metrics on top.
//!
//! # Example
//!
//! ```rust,no_run
//! use classbook_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the global Prometheus recorder and renders the scrape body.
///
/// The recorder is process-global. The HTTP exposure is left to the caller,
/// which mounts [`MetricsServer::render`] on its own router.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create an uninstalled server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder.
    ///
    /// A recorder that is already installed (common in tests) is not an error;
    /// the handle simply stays `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Address metrics are advertised on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Installed handle, if this instance installed the recorder.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render the Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    // Store
    describe_counter!("store_commands_total", "Actions sent to a keyed store");
    describe_counter!(
        "store_effects_total",
        "Effects executed by the keyed store, by kind"
    );
    describe_histogram!(
        "store_reducer_duration_seconds",
        "Time spent inside reducers"
    );
    describe_histogram!(
        "store_transaction_duration_seconds",
        "Time a key stayed locked for one transaction"
    );
    describe_gauge!(
        "store_detached_effects_pending",
        "Post-commit effects still running"
    );

    // Journal
    describe_counter!(
        "event_store_events_appended_total",
        "Facts appended to the journal"
    );
    describe_counter!(
        "event_store_events_loaded_total",
        "Facts loaded from the journal"
    );
    describe_counter!(
        "event_store_append_failures_total",
        "Journal appends that failed"
    );
    describe_histogram!(
        "event_store_append_duration_seconds",
        "Time taken to append facts"
    );

    // Retry
    describe_counter!("retry_attempts_total", "Retry attempts");
    describe_counter!("retry_exhausted_total", "Operations that ran out of retries");
}

/// Keyed store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record one action entering the store.
    pub fn record_command() {
        counter!("store_commands_total").increment(1);
    }

    /// Record a reducer call.
    pub fn record_reduction(duration: Duration) {
        histogram!("store_reducer_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an effect of `kind` being executed.
    pub fn record_effect(kind: &'static str) {
        counter!("store_effects_total", "kind" => kind).increment(1);
    }

    /// Record how long a key was held.
    pub fn record_transaction(duration: Duration) {
        histogram!("store_transaction_duration_seconds").record(duration.as_secs_f64());
    }

    /// Publish the number of detached effects in flight.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_detached_pending(pending: usize) {
        gauge!("store_detached_effects_pending").set(pending as f64);
    }
}

/// Journal metrics recorder.
pub struct EventStoreMetrics;

impl EventStoreMetrics {
    /// Record a failed append.
    ///
    /// Successful appends and loads are counted by the journal backend itself.
    pub fn record_append_failure() {
        counter!("event_store_append_failures_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}
