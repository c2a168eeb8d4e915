//! Configuration for the booking server.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::deadlines::StudioTime;
use classbook_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// `PostgreSQL` journal; `None` keeps the journal in memory
    pub database: Option<DatabaseConfig>,
    /// Studio policy
    pub studio: StudioConfig,
    /// Notification delivery
    pub notifications: NotificationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Metrics server port (0 disables the exporter)
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Studio policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Studio time zone as a fixed offset east of UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Seated members a session needs once registration closes
    pub minimum_participants: usize,
    /// Seconds between low-attendance sweeps
    pub sweep_interval_secs: u64,
    /// Opening balance of the in-memory credit ledger
    pub default_member_credits: u32,
}

/// Notification retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Retries after the first failed delivery
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                metrics_port: env::var("METRICS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(9090),
                shutdown_timeout: env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            database: env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
                url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            }),
            studio: StudioConfig {
                utc_offset_minutes: env::var("STUDIO_UTC_OFFSET_MINUTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
                minimum_participants: env::var("MINIMUM_PARTICIPANTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(crate::course_book::MINIMUM_PARTICIPANTS),
                sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
                default_member_credits: env::var("DEFAULT_MEMBER_CREDITS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
            notifications: NotificationConfig {
                max_retries: env::var("NOTIFY_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
                initial_delay_ms: env::var("NOTIFY_INITIAL_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            },
        }
    }

    /// Studio time zone. Offsets outside ±24h fall back to UTC.
    #[must_use]
    pub fn studio_time(&self) -> StudioTime {
        StudioTime::from_offset_minutes(self.studio.utc_offset_minutes).unwrap_or_else(|| {
            tracing::warn!(
                offset_minutes = self.studio.utc_offset_minutes,
                "Invalid studio offset, using UTC"
            );
            StudioTime::utc()
        })
    }

    /// Retry policy for notification delivery
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.notifications.max_retries)
            .initial_delay(Duration::from_millis(self.notifications.initial_delay_ms))
            .build()
    }

    /// Interval between low-attendance sweeps (at least one second)
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.studio.sweep_interval_secs.max(1))
    }

    /// Address the HTTP server binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    /// Address of the Prometheus exporter, if enabled
    #[must_use]
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        if self.server.metrics_port == 0 {
            return None;
        }
        format!("{}:{}", self.server.host, self.server.metrics_port).parse().ok()
    }
}
