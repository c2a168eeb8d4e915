//! Dependencies injected into the course book reducer.

use crate::credits::CreditLedger;
use crate::deadlines::StudioTime;
use crate::notifications::Notifier;
use classbook_core::environment::Clock;
use classbook_core::event_store::EventStore;
use classbook_runtime::retry::RetryPolicy;
use std::sync::Arc;

/// Minimum seated members a session needs once registration closes.
pub const MINIMUM_PARTICIPANTS: usize = 3;

/// Environment dependencies for the course book reducer
#[derive(Clone)]
pub struct CourseEnvironment {
    /// Clock for deadlines and timestamps
    pub clock: Arc<dyn Clock>,
    /// Journal for course facts
    pub event_store: Arc<dyn EventStore>,
    /// Member credit ledger
    pub credits: Arc<dyn CreditLedger>,
    /// Downstream notification channel
    pub notifier: Arc<dyn Notifier>,
    /// Studio time zone
    pub studio_time: StudioTime,
    /// Viability threshold for the low-attendance sweep
    pub minimum_participants: usize,
    /// Retry policy for notification delivery
    pub notify_retry: RetryPolicy,
}

impl CourseEnvironment {
    /// Creates a new `CourseEnvironment` with the default threshold and retry policy
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        credits: Arc<dyn CreditLedger>,
        notifier: Arc<dyn Notifier>,
        studio_time: StudioTime,
    ) -> Self {
        Self {
            clock,
            event_store,
            credits,
            notifier,
            studio_time,
            minimum_participants: MINIMUM_PARTICIPANTS,
            notify_retry: RetryPolicy::default(),
        }
    }

    /// Override the viability threshold
    #[must_use]
    pub fn with_minimum_participants(mut self, minimum: usize) -> Self {
        self.minimum_participants = minimum;
        self
    }

    /// Override the notification retry policy
    #[must_use]
    pub fn with_notify_retry(mut self, policy: RetryPolicy) -> Self {
        self.notify_retry = policy;
        self
    }
}

impl std::fmt::Debug for CourseEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourseEnvironment")
            .field("studio_time", &self.studio_time)
            .field("minimum_participants", &self.minimum_participants)
            .field("notify_retry", &self.notify_retry)
            .finish_non_exhaustive()
    }
}
