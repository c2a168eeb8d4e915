//! Engine facade.
//!
//! [`Engine`] is what request handlers and the scheduler talk to. It owns the
//! keyed aggregate store, keeps a claim → session index, and turns each
//! transaction transcript into a structured result.

use crate::course_book::{
    COURSE_CATEGORY, CourseAction, CourseBook, CourseBookReducer, CourseEnvironment, CourseEvent,
    Occupancy, Roster,
};
use crate::error::{BookingError, RejectionReason};
use crate::metrics;
use crate::sweep::{self, SweepSummary};
use crate::types::{Actor, Claim, ClaimId, ClaimStatus, Claimant, MemberId, Session, SessionId};
use classbook_core::stream::StreamId;
use classbook_runtime::{KeyedStore, StoreConfig, StoreError, Transaction};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Result of a successful claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
    /// The new claim
    pub claim_id: ClaimId,
    /// Session it was made against
    pub session_id: SessionId,
    /// `Registered` or `Waitlisted`
    pub status: ClaimStatus,
    /// Seat usage right after the claim
    pub occupancy: Occupancy,
    /// 1-based queue position for waitlisted claims
    pub waitlist_position: Option<usize>,
}

/// Result of a cancellation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The claim was released
    Cancelled {
        /// Waitlisted claims that took the freed seat
        promoted: Vec<ClaimId>,
    },
    /// The claim had been cancelled before; nothing changed
    AlreadyCancelled,
}

/// Claims moved by one administrative operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeatChanges {
    /// Claims cancelled
    pub cancelled: Vec<ClaimId>,
    /// Seated claims sent back to the waitlist
    pub demoted: Vec<ClaimId>,
    /// Waitlisted claims that got a seat
    pub promoted: Vec<ClaimId>,
}

impl SeatChanges {
    fn from_actions(actions: &[CourseAction]) -> Self {
        let mut changes = Self::default();
        for action in actions {
            match action {
                CourseAction::Recorded(
                    event @ (CourseEvent::ClaimCancelled { .. }
                    | CourseEvent::ClaimsRemoved { .. }
                    | CourseEvent::CourseCancelled { .. }),
                ) => {
                    changes.cancelled.extend(event.released_claims());
                },
                CourseAction::Recorded(CourseEvent::ClaimDemoted { claim_id, .. }) => {
                    changes.demoted.push(*claim_id);
                },
                CourseAction::Recorded(CourseEvent::ClaimPromoted { claim_id, .. }) => {
                    changes.promoted.push(*claim_id);
                },
                _ => {},
            }
        }
        changes
    }
}

/// The course capacity and waitlist engine.
pub struct Engine {
    store: KeyedStore<SessionId, CourseBookReducer>,
    claim_index: RwLock<HashMap<ClaimId, SessionId>>,
}

impl Engine {
    /// Create an engine with default runtime limits
    #[must_use]
    pub fn new(env: CourseEnvironment) -> Self {
        Self::with_config(env, StoreConfig::default())
    }

    /// Create an engine with custom runtime limits
    #[must_use]
    pub fn with_config(env: CourseEnvironment, config: StoreConfig) -> Self {
        Self {
            store: KeyedStore::with_config(CourseBookReducer::new(), env, config),
            claim_index: RwLock::new(HashMap::new()),
        }
    }

    /// The injected environment
    #[must_use]
    pub const fn environment(&self) -> &CourseEnvironment {
        self.store.environment()
    }

    /// Register a new session.
    ///
    /// # Errors
    ///
    /// - [`RejectionReason::InvalidSession`] if the definition is inconsistent
    /// - [`RejectionReason::DuplicateSession`] if the id is taken
    #[tracing::instrument(skip_all, fields(session_id = %session.id))]
    pub async fn schedule(&self, session: Session) -> Result<Session, BookingError> {
        session.validate().map_err(RejectionReason::InvalidSession)?;
        let session_id = session.id;

        self.store
            .insert(session_id, CourseBook::new(session))
            .await
            .map_err(|error| match error {
                StoreError::DuplicateKey(_) => BookingError::from(RejectionReason::DuplicateSession),
                other => BookingError::from(other),
            })?;
        self.send(session_id, CourseAction::Schedule).await?;
        metrics::record_sessions(self.store.len().await);

        tracing::info!("Session scheduled");
        self.session(session_id).await
    }

    /// Claim a seat for `claimant`.
    ///
    /// Seats the claimant if a seat is free (debiting one credit for members),
    /// otherwise appends them to the waitlist.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Rejected`] for deadline, duplicate, cancelled-session or credit refusals
    /// - [`BookingError::SessionNotFound`] for an unknown session
    #[tracing::instrument(skip_all, fields(session_id = %session_id))]
    pub async fn claim(&self, session_id: SessionId, claimant: Claimant) -> Result<ClaimOutcome, BookingError> {
        let claim_id = ClaimId::new();
        let tx = self
            .send(session_id, CourseAction::RequestClaim { claim_id, claimant })
            .await?;

        let verdict = tx.find_last(|action| match action {
            CourseAction::Recorded(CourseEvent::ClaimSeated { claim_id: id, .. }) if *id == claim_id => {
                Some(Ok(ClaimStatus::Registered))
            },
            CourseAction::Recorded(CourseEvent::ClaimWaitlisted { claim_id: id, .. }) if *id == claim_id => {
                Some(Ok(ClaimStatus::Waitlisted))
            },
            CourseAction::ClaimRejected { claim_id: id, reason } if *id == claim_id => {
                Some(Err(BookingError::Rejected(reason.clone())))
            },
            CourseAction::IntegrityViolation { detail } => {
                Some(Err(BookingError::IntegrityViolation(detail.clone())))
            },
            _ => None,
        });
        let status = verdict.unwrap_or_else(|| {
            Err(BookingError::IntegrityViolation(format!(
                "claim {claim_id} produced no outcome"
            )))
        })?;

        self.claim_index.write().await.insert(claim_id, session_id);

        let (occupancy, waitlist_position) = self
            .store
            .state(&session_id, |book| (book.occupancy(), book.waitlist_position(&claim_id)))
            .await
            .ok_or(BookingError::SessionNotFound(session_id))?;

        tracing::info!(claim_id = %claim_id, %status, %occupancy, "Claim accepted");
        Ok(ClaimOutcome {
            claim_id,
            session_id,
            status,
            occupancy,
            waitlist_position,
        })
    }

    /// Cancel a claim.
    ///
    /// Cancelling an already-cancelled claim is a no-op. Releasing a seat
    /// refunds the member's credit and promotes from the waitlist.
    ///
    /// # Errors
    ///
    /// - [`RejectionReason::CancellationClosed`] after the deadline (non-admin actors)
    /// - [`RejectionReason::NotClaimant`] if `actor` does not hold the claim
    /// - [`BookingError::ClaimNotFound`] for an unknown claim
    #[tracing::instrument(skip_all, fields(claim_id = %claim_id, actor = %actor))]
    pub async fn cancel(&self, claim_id: ClaimId, actor: Actor) -> Result<CancelOutcome, BookingError> {
        let session_id = self.session_of(claim_id).await?;
        let tx = self
            .send(session_id, CourseAction::CancelClaim { claim_id, actor })
            .await?;

        for action in tx.actions() {
            match action {
                CourseAction::AlreadyCancelled { claim_id: id } if *id == claim_id => {
                    return Ok(CancelOutcome::AlreadyCancelled);
                },
                CourseAction::CancellationRejected { claim_id: id, reason } if *id == claim_id => {
                    return Err(BookingError::Rejected(reason.clone()));
                },
                CourseAction::ClaimNotFound { claim_id: id } if *id == claim_id => {
                    return Err(BookingError::ClaimNotFound(claim_id));
                },
                _ => {},
            }
        }

        let changes = SeatChanges::from_actions(tx.actions());
        if !changes.cancelled.contains(&claim_id) {
            return Err(BookingError::IntegrityViolation(format!(
                "cancellation of {claim_id} produced no outcome"
            )));
        }
        tracing::info!(promoted = changes.promoted.len(), "Claim cancelled");
        Ok(CancelOutcome::Cancelled {
            promoted: changes.promoted,
        })
    }

    /// Remove several claims at once on behalf of staff, then refill freed seats in queue order.
    ///
    /// Unknown and already-cancelled ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SessionNotFound`] for an unknown session.
    #[tracing::instrument(skip_all, fields(session_id = %session_id, admin = %admin, count = claim_ids.len()))]
    pub async fn remove_claims(
        &self,
        session_id: SessionId,
        claim_ids: Vec<ClaimId>,
        admin: MemberId,
    ) -> Result<SeatChanges, BookingError> {
        let tx = self
            .send(session_id, CourseAction::RemoveClaims { claim_ids, admin })
            .await?;
        let changes = SeatChanges::from_actions(tx.actions());
        tracing::info!(
            cancelled = changes.cancelled.len(),
            promoted = changes.promoted.len(),
            "Claims removed"
        );
        Ok(changes)
    }

    /// Record that a seated member missed the class.
    ///
    /// Only allowed on the session's calendar day in studio time. Marking an
    /// already-marked claim changes nothing.
    ///
    /// # Errors
    ///
    /// - [`RejectionReason::NotSessionDay`], [`RejectionReason::GuestNotMarkable`] or
    ///   [`RejectionReason::NotRegistered`] when the guard refuses
    /// - [`BookingError::ClaimNotFound`] for an unknown claim
    #[tracing::instrument(skip_all, fields(claim_id = %claim_id, marker = %marker))]
    pub async fn mark_no_show(&self, claim_id: ClaimId, marker: MemberId) -> Result<Claim, BookingError> {
        let session_id = self.session_of(claim_id).await?;
        let tx = self
            .send(session_id, CourseAction::MarkNoShow { claim_id, marker })
            .await?;
        Self::attendance_failure(&tx, claim_id)?;
        self.claim_in(session_id, claim_id).await
    }

    /// Clear a no-show mark. Clearing an unmarked claim changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::ClaimNotFound`] for an unknown claim.
    #[tracing::instrument(skip_all, fields(claim_id = %claim_id))]
    pub async fn undo_no_show(&self, claim_id: ClaimId) -> Result<Claim, BookingError> {
        let session_id = self.session_of(claim_id).await?;
        let tx = self
            .send(session_id, CourseAction::UndoNoShow { claim_id })
            .await?;
        Self::attendance_failure(&tx, claim_id)?;
        self.claim_in(session_id, claim_id).await
    }

    fn attendance_failure(tx: &Transaction<CourseAction>, claim_id: ClaimId) -> Result<(), BookingError> {
        tx.find_last(|action| match action {
            CourseAction::AttendanceRejected { claim_id: id, reason } if *id == claim_id => {
                Some(BookingError::Rejected(reason.clone()))
            },
            CourseAction::ClaimNotFound { claim_id: id } if *id == claim_id => {
                Some(BookingError::ClaimNotFound(claim_id))
            },
            _ => None,
        })
        .map_or(Ok(()), Err)
    }

    /// Call off every session that closed registration with too few members.
    ///
    /// Sessions are checked one by one; a failure on one is logged and the
    /// sweep moves on.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_low_attendance(&self) -> SweepSummary {
        let env = self.store.environment();
        let now = env.clock.now();
        let studio = env.studio_time;

        let mut summary = SweepSummary::default();
        let mut session_ids = self.store.keys().await;
        session_ids.sort();

        for session_id in session_ids {
            let in_scope = self
                .store
                .state(&session_id, |book| sweep::in_scope(book, now, studio))
                .await
                .unwrap_or(false);
            if !in_scope {
                continue;
            }
            summary.checked += 1;

            match self.store.send(&session_id, CourseAction::CheckAttendance).await {
                Ok(tx) => {
                    let called_off = tx.actions().iter().any(|action| {
                        matches!(
                            action,
                            CourseAction::Recorded(CourseEvent::CourseCancelled {
                                low_attendance: true,
                                ..
                            })
                        )
                    });
                    if called_off {
                        summary.cancelled.push(session_id);
                    }
                },
                Err(error) => {
                    tracing::warn!(session_id = %session_id, %error, "Sweep failed for session, continuing");
                },
            }
        }

        tracing::info!(
            checked = summary.checked,
            cancelled = summary.cancelled.len(),
            "Low-attendance sweep finished"
        );
        summary
    }

    /// Call off a session on behalf of staff. Every active claim is cancelled
    /// and seated members are refunded; nobody is promoted.
    ///
    /// Calling off a session that is already called off changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SessionNotFound`] for an unknown session.
    #[tracing::instrument(skip_all, fields(session_id = %session_id, admin = %admin))]
    pub async fn cancel_course(&self, session_id: SessionId, admin: MemberId) -> Result<SeatChanges, BookingError> {
        let tx = self
            .send(session_id, CourseAction::CancelCourse { admin })
            .await?;
        Ok(SeatChanges::from_actions(tx.actions()))
    }

    /// Demote over-capacity seats (latest first), then refill free seats from the waitlist.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SessionNotFound`] for an unknown session.
    #[tracing::instrument(skip_all, fields(session_id = %session_id))]
    pub async fn reconcile(&self, session_id: SessionId) -> Result<SeatChanges, BookingError> {
        let tx = self.send(session_id, CourseAction::Reconcile).await?;
        Ok(SeatChanges::from_actions(tx.actions()))
    }

    /// Seat usage of a session
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SessionNotFound`] for an unknown session.
    pub async fn occupancy(&self, session_id: SessionId) -> Result<Occupancy, BookingError> {
        self.read(session_id, CourseBook::occupancy).await
    }

    /// Seated claims and the ordered waitlist
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SessionNotFound`] for an unknown session.
    pub async fn roster(&self, session_id: SessionId) -> Result<Roster, BookingError> {
        self.read(session_id, CourseBook::roster).await
    }

    /// The session definition and its cancellation flags
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SessionNotFound`] for an unknown session.
    pub async fn session(&self, session_id: SessionId) -> Result<Session, BookingError> {
        self.read(session_id, |book| book.session.clone()).await
    }

    /// Last collaborator or journal error recorded on a session
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SessionNotFound`] for an unknown session.
    pub async fn last_error(&self, session_id: SessionId) -> Result<Option<String>, BookingError> {
        self.read(session_id, |book| book.last_error.clone()).await
    }

    /// A single claim
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::ClaimNotFound`] for an unknown claim.
    pub async fn claim_details(&self, claim_id: ClaimId) -> Result<Claim, BookingError> {
        let session_id = self.session_of(claim_id).await?;
        self.claim_in(session_id, claim_id).await
    }

    /// Rebuild every session from the journal.
    ///
    /// Facts are replayed through the pure apply path, so no collaborator is
    /// called for history. Each restored session is reconciled afterwards.
    /// Returns the number of sessions restored.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Journal`] if streams cannot be listed, loaded or decoded.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Result<usize, BookingError> {
        let journal = Arc::clone(&self.store.environment().event_store);
        let streams = journal
            .list_streams(StreamId::category_prefix(COURSE_CATEGORY))
            .await
            .map_err(|e| BookingError::Journal(e.to_string()))?;

        let mut restored = 0;
        for stream_id in streams {
            let facts = journal
                .load_events(stream_id.clone(), None)
                .await
                .map_err(|e| BookingError::Journal(format!("{stream_id}: {e}")))?;
            let mut events = facts.iter().map(|fact| {
                fact.decode::<CourseEvent>()
                    .map_err(|e| BookingError::Journal(format!("{stream_id}: {e}")))
            });

            let Some(CourseEvent::CourseScheduled { session }) = events.next().transpose()? else {
                tracing::error!(stream_id = %stream_id, "Stream does not start with a schedule, skipping");
                continue;
            };
            let mut book = CourseBook::new(session);
            for event in events {
                CourseBookReducer::apply_event(&mut book, &event?);
            }

            let session_id = book.session.id;
            let claim_ids: Vec<ClaimId> = book.claims().iter().map(|claim| claim.id).collect();
            if let Err(error) = self.store.insert(session_id, book).await {
                tracing::warn!(session_id = %session_id, %error, "Session already loaded, skipping");
                continue;
            }
            {
                let mut index = self.claim_index.write().await;
                for claim_id in claim_ids {
                    index.insert(claim_id, session_id);
                }
            }
            self.reconcile(session_id).await?;
            restored += 1;
        }

        metrics::record_sessions(self.store.len().await);
        tracing::info!(restored, "Sessions restored from journal");
        Ok(restored)
    }

    /// Wait until post-commit work (notifications) has drained.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EffectsTimeout`] if work is still running after `timeout`.
    pub async fn wait_for_effects(&self, timeout: Duration) -> Result<(), BookingError> {
        let deadline = Instant::now() + timeout;
        loop {
            let pending = self.store.pending_effects();
            if pending == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(StoreError::EffectsTimeout(pending).into());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop accepting commands and drain post-commit work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if work is still running after the configured timeout.
    pub async fn shutdown(&self) -> Result<(), BookingError> {
        self.store.shutdown().await.map_err(BookingError::from)
    }

    async fn send(
        &self,
        session_id: SessionId,
        action: CourseAction,
    ) -> Result<Transaction<CourseAction>, BookingError> {
        self.store
            .send(&session_id, action)
            .await
            .map_err(|error| match error {
                StoreError::UnknownKey(_) => BookingError::SessionNotFound(session_id),
                other => BookingError::from(other),
            })
    }

    async fn read<T>(&self, session_id: SessionId, f: impl FnOnce(&CourseBook) -> T) -> Result<T, BookingError> {
        self.store
            .state(&session_id, f)
            .await
            .ok_or(BookingError::SessionNotFound(session_id))
    }

    async fn session_of(&self, claim_id: ClaimId) -> Result<SessionId, BookingError> {
        self.claim_index
            .read()
            .await
            .get(&claim_id)
            .copied()
            .ok_or(BookingError::ClaimNotFound(claim_id))
    }

    async fn claim_in(&self, session_id: SessionId, claim_id: ClaimId) -> Result<Claim, BookingError> {
        self.read(session_id, |book| book.claim(&claim_id).cloned())
            .await?
            .ok_or(BookingError::ClaimNotFound(claim_id))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("environment", self.store.environment())
            .finish_non_exhaustive()
    }
}
