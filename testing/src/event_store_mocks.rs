//! In-memory journal.
//!
//! [`InMemoryEventStore`] implements the full [`EventStore`] contract (version
//! checks included) on a `BTreeMap`. It backs unit tests and single-node
//! development runs where no database is configured.

use classbook_core::event::SerializedEvent;
use classbook_core::event_store::{EventStore, EventStoreError};
use classbook_core::stream::{StreamId, Version};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Map-backed journal.
///
/// Cloning shares the underlying streams.
///
/// # Example
///
/// ```
/// use classbook_testing::InMemoryEventStore;
/// use classbook_core::event::SerializedEvent;
/// use classbook_core::event_store::EventStore;
/// use classbook_core::stream::{StreamId, Version};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryEventStore::new();
/// let fact = SerializedEvent::new("Noted.v1".into(), vec![1], None);
/// let version = store
///     .append_events(StreamId::new("course-1"), Some(Version::INITIAL), vec![fact])
///     .await?;
/// assert_eq!(version, Version::new(1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<BTreeMap<StreamId, Vec<SerializedEvent>>>>,
    fail_appends: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    /// Create an empty journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail with a database error (or stop doing so)
    ///
    /// Lets tests exercise the journal-failure path.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of facts in `stream_id`
    #[must_use]
    pub fn stream_len(&self, stream_id: &StreamId) -> usize {
        self.streams
            .read()
            .map(|streams| streams.get(stream_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Event type names in `stream_id`, in append order
    #[must_use]
    pub fn event_types(&self, stream_id: &StreamId) -> Vec<String> {
        self.streams
            .read()
            .map(|streams| {
                streams
                    .get(stream_id)
                    .map(|events| events.iter().map(|e| e.event_type.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Total facts per stream
    #[must_use]
    pub fn stream_counts(&self) -> HashMap<StreamId, usize> {
        self.streams
            .read()
            .map(|streams| {
                streams
                    .iter()
                    .map(|(id, events)| (id.clone(), events.len()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn poisoned() -> EventStoreError {
        EventStoreError::DatabaseError("in-memory journal lock poisoned".to_string())
    }
}

impl EventStore for InMemoryEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(EventStoreError::DatabaseError(
                    "append rejected by test switch".to_string(),
                ));
            }

            let mut streams = self.streams.write().map_err(|_| Self::poisoned())?;
            let stream = streams.entry(stream_id.clone()).or_default();
            let actual = Version::new(stream.len() as u64);

            if let Some(expected) = expected_version {
                if expected != actual {
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id,
                        expected,
                        actual,
                    });
                }
            }

            let new_version = actual.advanced_by(events.len());
            stream.extend(events);
            Ok(new_version)
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let streams = self.streams.read().map_err(|_| Self::poisoned())?;
            let skip = from_version.map_or(0, |v| usize::try_from(v.value()).unwrap_or(usize::MAX));
            Ok(streams
                .get(&stream_id)
                .map(|events| events.iter().skip(skip).cloned().collect())
                .unwrap_or_default())
        })
    }

    fn list_streams(
        &self,
        prefix: String,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StreamId>, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.read().map_err(|_| Self::poisoned())?;
            Ok(streams
                .keys()
                .filter(|id| id.as_str().starts_with(&prefix))
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fact(name: &str) -> SerializedEvent {
        SerializedEvent::new(name.to_string(), vec![0, 1], None)
    }

    #[tokio::test]
    async fn append_checks_expected_version() {
        let store = InMemoryEventStore::new();
        let stream = StreamId::new("course-1");

        let v = store
            .append_events(stream.clone(), Some(Version::INITIAL), vec![fact("A.v1"), fact("B.v1")])
            .await
            .unwrap();
        assert_eq!(v, Version::new(2));

        let conflict = store
            .append_events(stream.clone(), Some(Version::new(1)), vec![fact("C.v1")])
            .await;
        assert!(matches!(
            conflict,
            Err(EventStoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(2)
        ));

        let unchecked = store
            .append_events(stream.clone(), None, vec![fact("C.v1")])
            .await
            .unwrap();
        assert_eq!(unchecked, Version::new(3));
        assert_eq!(store.event_types(&stream), vec!["A.v1", "B.v1", "C.v1"]);
    }

    #[tokio::test]
    async fn load_from_version_skips_prefix() {
        let store = InMemoryEventStore::new();
        let stream = StreamId::new("course-1");
        store
            .append_events(stream.clone(), None, vec![fact("A.v1"), fact("B.v1"), fact("C.v1")])
            .await
            .unwrap();

        let tail = store.load_events(stream.clone(), Some(Version::new(1))).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].event_type, "B.v1");

        let missing = store.load_events(StreamId::new("course-2"), None).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn list_streams_filters_by_prefix() {
        let store = InMemoryEventStore::new();
        for id in ["course-b", "member-x", "course-a"] {
            store.append_events(StreamId::new(id), None, vec![fact("A.v1")]).await.unwrap();
        }

        let courses = store.list_streams("course-".to_string()).await.unwrap();
        assert_eq!(courses, vec![StreamId::new("course-a"), StreamId::new("course-b")]);
    }

    #[tokio::test]
    async fn failure_switch_rejects_appends() {
        let store = InMemoryEventStore::new();
        store.fail_appends(true);
        let result = store.append_events(StreamId::new("course-1"), None, vec![fact("A.v1")]).await;
        assert!(matches!(result, Err(EventStoreError::DatabaseError(_))));

        store.fail_appends(false);
        assert!(store.append_events(StreamId::new("course-1"), None, vec![fact("A.v1")]).await.is_ok());
        assert_eq!(store.stream_len(&StreamId::new("course-1")), 1);
    }
}
