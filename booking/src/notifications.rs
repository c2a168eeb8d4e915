//! Notification dispatcher collaborator.
//!
//! Notifications are fire-and-forget. Delivery runs after the state change has
//! committed; failures are retried, then logged and dropped.

use crate::types::{ClaimId, Claimant, MemberId, Session, SessionId};
use chrono::{NaiveDate, NaiveTime};
use classbook_runtime::retry::{RetryPolicy, retry_with_backoff};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// What downstream channels need to know about a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session id
    pub session_id: SessionId,
    /// Class title
    pub title: String,
    /// Trainer name
    pub trainer: String,
    /// Studio-local date
    pub date: NaiveDate,
    /// Studio-local start time
    pub start_time: NaiveTime,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id,
            title: session.title.clone(),
            trainer: session.trainer.clone(),
            date: session.date,
            start_time: session.start_time,
        }
    }
}

/// Structured notification payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A waitlisted claim got a seat
    WaitlistPromoted {
        /// Promoted claim
        claim_id: ClaimId,
        /// Who was promoted
        claimant: Claimant,
        /// The class
        session: SessionSummary,
    },
    /// A member missed a class
    NoShowRecorded {
        /// Marked claim
        claim_id: ClaimId,
        /// Member who did not show up
        member_id: MemberId,
        /// Staff member who marked it
        marked_by: MemberId,
        /// The class
        session: SessionSummary,
    },
    /// The sweep called off an under-booked class
    CourseCancelledLowAttendance {
        /// The class
        session: SessionSummary,
        /// Everyone who held a seat or a waitlist spot
        participants: Vec<Claimant>,
    },
    /// Staff called off a class
    CourseCancelled {
        /// The class
        session: SessionSummary,
        /// Everyone who held a seat or a waitlist spot
        participants: Vec<Claimant>,
    },
}

impl Notification {
    /// Event type name used by downstream channels
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::WaitlistPromoted { .. } => "WaitlistPromoted",
            Self::NoShowRecorded { .. } => "NoShowRecorded",
            Self::CourseCancelledLowAttendance { .. } => "CourseCancelledLowAttendance",
            Self::CourseCancelled { .. } => "CourseCancelled",
        }
    }
}

/// Delivery failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The downstream channel refused or timed out
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Notification dispatcher interface.
pub trait Notifier: Send + Sync {
    /// Hand `notification` to the downstream channel.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the channel refuses it.
    fn emit(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>>;
}

/// Deliver with retries. Never fails; an undeliverable notification is logged and dropped.
pub async fn deliver(notifier: &dyn Notifier, policy: &RetryPolicy, notification: Notification) {
    let event_type = notification.event_type();
    let result = retry_with_backoff(policy, event_type, || notifier.emit(notification.clone())).await;

    match result {
        Ok(()) => {
            crate::metrics::record_notification(event_type, "delivered");
        },
        Err(error) => {
            tracing::warn!(event_type, %error, "Dropping undeliverable notification");
            crate::metrics::record_notification(event_type, "dropped");
            crate::metrics::record_collaborator_failure("notifier");
        },
    }
}

/// Writes notifications to the log as JSON.
///
/// Stands in for the email/messaging fan-out in development.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn emit(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>> {
        Box::pin(async move {
            let payload = serde_json::to_string(&notification)
                .map_err(|e| NotifyError::Delivery(e.to_string()))?;
            tracing::info!(event_type = notification.event_type(), %payload, "Notification emitted");
            Ok(())
        })
    }
}

/// Keeps every delivered notification in memory.
///
/// `fail_next` makes the next deliveries fail, to exercise the retry path.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `attempts` deliveries
    pub fn fail_next(&self, attempts: usize) {
        self.failures_left.store(attempts, Ordering::SeqCst);
    }

    /// Delivered notifications, oldest first
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Number of delivered notifications of `event_type`
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.sent()
            .iter()
            .filter(|n| n.event_type() == event_type)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn emit(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>> {
        let recorder = self.clone();
        Box::pin(async move {
            let failing = recorder
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(NotifyError::Delivery("simulated outage".to_string()));
            }
            recorder
                .sent
                .lock()
                .map_err(|_| NotifyError::Delivery("recorder lock poisoned".to_string()))?
                .push(notification);
            Ok(())
        })
    }
}
