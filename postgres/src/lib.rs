//! `PostgreSQL` journal for Classbook.
//!
//! Implements [`EventStore`] on a single `events` table keyed by
//! `(stream_id, version)`. The primary key is the concurrency guard: two writers
//! racing for the same version cannot both insert.
//!
//! # Example
//!
//! ```ignore
//! use classbook_postgres::PostgresEventStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let journal = PostgresEventStore::connect("postgres://localhost/classbook", 5).await?;
//!     journal.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use classbook_core::event::SerializedEvent;
use classbook_core::event_store::{EventStore, EventStoreError};
use classbook_core::stream::{StreamId, Version};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

/// Postgres SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Journal backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Connect with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        tracing::info!(max_connections, "Connected to journal database");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        tracing::info!("Journal schema is up to date");
        Ok(())
    }

    async fn append(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Result<Version, EventStoreError> {
        let started = Instant::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

        let (current,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM events WHERE stream_id = $1")
                .bind(stream_id.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        let actual = Version::new(u64::try_from(current).unwrap_or(0));

        if let Some(expected) = expected_version {
            if expected != actual {
                return Err(EventStoreError::ConcurrencyConflict {
                    stream_id,
                    expected,
                    actual,
                });
            }
        }

        let count = events.len();
        let mut next = current;
        for event in events {
            next += 1;
            let inserted = sqlx::query(
                r"
                INSERT INTO events (stream_id, version, event_type, event_data, metadata)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(stream_id.as_str())
            .bind(next)
            .bind(&event.event_type)
            .bind(&event.data)
            .bind(&event.metadata)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                let conflict = e
                    .as_database_error()
                    .and_then(|db| db.code())
                    .is_some_and(|code| code == UNIQUE_VIOLATION);
                if conflict {
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id,
                        expected: actual,
                        actual: Version::new(u64::try_from(next).unwrap_or(0)),
                    });
                }
                return Err(EventStoreError::DatabaseError(e.to_string()));
            }
        }

        tx.commit()
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

        metrics::counter!("event_store_events_appended_total").increment(count as u64);
        metrics::histogram!("event_store_append_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(stream_id = %stream_id, count, "Appended facts");

        Ok(actual.advanced_by(count))
    }

    async fn load(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Result<Vec<SerializedEvent>, EventStoreError> {
        let after = from_version.map_or(0, |v| i64::try_from(v.value()).unwrap_or(i64::MAX));
        let rows = sqlx::query(
            r"
            SELECT event_type, event_data, metadata
            FROM events
            WHERE stream_id = $1 AND version > $2
            ORDER BY version ASC
            ",
        )
        .bind(stream_id.as_str())
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

        let events = rows
            .iter()
            .map(|row| {
                Ok(SerializedEvent::new(
                    row.try_get("event_type")
                        .map_err(|e| EventStoreError::SerializationError(e.to_string()))?,
                    row.try_get("event_data")
                        .map_err(|e| EventStoreError::SerializationError(e.to_string()))?,
                    row.try_get("metadata")
                        .map_err(|e| EventStoreError::SerializationError(e.to_string()))?,
                ))
            })
            .collect::<Result<Vec<_>, EventStoreError>>()?;

        metrics::counter!("event_store_events_loaded_total").increment(events.len() as u64);
        Ok(events)
    }

    async fn streams(&self, prefix: String) -> Result<Vec<StreamId>, EventStoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT DISTINCT stream_id
            FROM events
            WHERE left(stream_id, length($1)) = $1
            ORDER BY stream_id
            ",
        )
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| StreamId::new(id)).collect())
    }
}

impl EventStore for PostgresEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(self.append(stream_id, expected_version, events))
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
    {
        Box::pin(self.load(stream_id, from_version))
    }

    fn list_streams(
        &self,
        prefix: String,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StreamId>, EventStoreError>> + Send + '_>> {
        Box::pin(self.streams(prefix))
    }
}
