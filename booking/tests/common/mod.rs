//! Shared fixtures for booking integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use booking::course_book::CourseEnvironment;
use booking::{
    Claimant, Engine, GuestIdentity, InMemoryCreditLedger, MemberId, RecordingNotifier, Session,
    SessionId, StudioTime,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use classbook_runtime::retry::RetryPolicy;
use classbook_testing::{InMemoryEventStore, ManualClock};
use std::sync::Arc;

/// Engine wired to in-memory collaborators the test can inspect.
pub struct Harness {
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
    pub journal: InMemoryEventStore,
    pub credits: InMemoryCreditLedger,
    pub notifier: RecordingNotifier,
    pub studio: StudioTime,
}

impl Harness {
    /// UTC studio, clock at `now` (RFC 3339)
    pub fn at(now: &str) -> Self {
        Self::in_studio(now, StudioTime::utc())
    }

    /// Custom studio time zone, clock at `now` (RFC 3339)
    pub fn in_studio(now: &str, studio: StudioTime) -> Self {
        Self::with_journal(now, studio, InMemoryEventStore::new())
    }

    /// Reuse an existing journal, e.g. to simulate a restart
    pub fn with_journal(now: &str, studio: StudioTime, journal: InMemoryEventStore) -> Self {
        let clock = Arc::new(ManualClock::at(now));
        let credits = InMemoryCreditLedger::new(10);
        let notifier = RecordingNotifier::new();
        let env = CourseEnvironment::new(
            clock.clone(),
            Arc::new(journal.clone()),
            Arc::new(credits.clone()),
            Arc::new(notifier.clone()),
            studio,
        )
        .with_notify_retry(
            RetryPolicy::builder()
                .max_retries(2)
                .initial_delay(std::time::Duration::from_millis(1))
                .build(),
        );

        Self {
            engine: Arc::new(Engine::new(env)),
            clock,
            journal,
            credits,
            notifier,
            studio,
        }
    }

    /// Schedule `session` and return its id
    pub async fn schedule(&self, session: Session) -> SessionId {
        self.engine.schedule(session).await.expect("schedule").id
    }

    /// Move the clock to `time`
    pub fn set(&self, time: DateTime<Utc>) {
        self.clock.set(time);
    }

    /// Wait for post-commit notifications to drain
    pub async fn settle(&self) {
        self.engine
            .wait_for_effects(std::time::Duration::from_secs(5))
            .await
            .expect("effects drain");
    }
}

/// A one-hour class on `date` starting at `start` (HH:MM, studio time).
pub fn session(date: &str, start: &str, capacity: u32) -> Session {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    let start_time = NaiveTime::parse_from_str(start, "%H:%M").unwrap();
    Session {
        id: SessionId::new(),
        title: "Spinning".into(),
        trainer: "Jo".into(),
        date,
        start_time,
        end_time: start_time + Duration::hours(1),
        duration_minutes: 60,
        max_participants: capacity,
        registration_deadline_minutes: 60,
        cancellation_deadline_minutes: 120,
        is_cancelled: false,
        cancelled_due_to_low_attendance: false,
    }
}

/// UTC instant from RFC 3339
pub fn instant(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

pub fn member() -> (MemberId, Claimant) {
    let id = MemberId::new();
    (id, Claimant::Member(id))
}

pub fn guest(email: &str) -> Claimant {
    Claimant::Guest(GuestIdentity::new("Guest", email, None))
}
