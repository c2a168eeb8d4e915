//! Append-only journal of aggregate streams.
//!
//! The journal is the durable record of every fact an aggregate has produced.
//! Writers append with an expected version; a mismatch means another writer got
//! there first and the append is refused.
//!
//! # Implementations
//!
//! - `PostgresEventStore` (in `classbook-postgres`): durable storage
//! - `InMemoryEventStore` (in `classbook-testing`): process-local, for tests and
//!   single-node development
//!
//! # Example
//!
//! ```no_run
//! use classbook_core::event_store::{EventStore, EventStoreError};
//! use classbook_core::stream::{StreamId, Version};
//!
//! async fn replay<E: EventStore>(store: &E) -> Result<(), EventStoreError> {
//!     for stream_id in store.list_streams("course-".to_string()).await? {
//!         let facts = store.load_events(stream_id, None).await?;
//!         println!("{} facts", facts.len());
//!     }
//!     Ok(())
//! }
//! ```

use crate::event::SerializedEvent;
use crate::stream::{StreamId, Version};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Journal failures.
#[derive(Error, Debug)]
pub enum EventStoreError {
    /// The stream moved on since the writer last looked at it.
    #[error("Concurrency conflict on {stream_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Stream that was contended.
        stream_id: StreamId,
        /// Version the writer assumed.
        expected: Version,
        /// Version actually found.
        actual: Version,
    },

    /// Backend connection or query failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Append-only journal.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be held as
/// `Arc<dyn EventStore>` inside an environment.
pub trait EventStore: Send + Sync {
    /// Append `events` to `stream_id`.
    ///
    /// `expected_version` of `Some(v)` asserts the stream is currently at `v`;
    /// `None` skips the check. Returns the stream's version after the append.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::ConcurrencyConflict`] on a version mismatch
    /// - [`EventStoreError::DatabaseError`] when the backend fails
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>>;

    /// Load facts in append order, starting at `from_version` (0-based, inclusive)
    /// or from the beginning when `None`.
    ///
    /// A stream that was never written returns an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] when the backend fails.
    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>;

    /// All stream ids starting with `prefix`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] when the backend fails.
    fn list_streams(
        &self,
        prefix: String,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StreamId>, EventStoreError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_names_stream_and_versions() {
        let error = EventStoreError::ConcurrencyConflict {
            stream_id: StreamId::new("course-1"),
            expected: Version::new(5),
            actual: Version::new(7),
        };

        let display = format!("{error}");
        assert!(display.contains("course-1"));
        assert!(display.contains("expected version 5"));
        assert!(display.contains("found 7"));
    }
}
