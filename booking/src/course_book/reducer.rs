//! Course book reducer.
//!
//! Commands decide and dispatch facts; facts are checked against the capacity
//! and uniqueness invariants, applied, journaled, and turned into collaborator
//! calls. Everything in one `KeyedStore::send` runs under the session's lock,
//! so the occupancy check and the seat transition form one atomic unit.

use super::actions::{CourseAction, CourseEvent, FailedRefund, ReleasedClaim};
use super::environment::CourseEnvironment;
use super::state::CourseBook;
use crate::attendance;
use crate::credits::DebitOutcome;
use crate::deadlines::Deadlines;
use crate::error::RejectionReason;
use crate::metrics;
use crate::notifications::{self, Notification, SessionSummary};
use crate::sweep::{self, Viability};
use crate::types::{Actor, AttendanceMark, Claim, ClaimId, ClaimStatus, Claimant, MemberId, SessionId};
use chrono::{DateTime, Utc};
use classbook_core::event::{Event, SerializedEvent};
use classbook_core::stream::StreamId;
use classbook_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use classbook_runtime::metrics::EventStoreMetrics;
use std::sync::Arc;

/// Journal category of course book streams (`course-<session_id>`).
pub const COURSE_CATEGORY: &str = "course";

type Effects = SmallVec<[Effect<CourseAction>; 4]>;

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for one session's claims
#[derive(Clone, Debug, Default)]
pub struct CourseBookReducer;

impl CourseBookReducer {
    /// Creates a new `CourseBookReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a `RequestClaim` command
    fn validate_claim(
        state: &CourseBook,
        claimant: &Claimant,
        now: DateTime<Utc>,
        env: &CourseEnvironment,
    ) -> Result<(), RejectionReason> {
        let deadlines = Deadlines::for_session(&state.session, env.studio_time);
        if !deadlines.registration_open(now) {
            return Err(RejectionReason::RegistrationClosed);
        }
        if state.session.is_called_off() {
            return Err(RejectionReason::SessionCancelled);
        }
        if state.active_claim_of(claimant).is_some() {
            return Err(RejectionReason::DuplicateClaim);
        }
        Ok(())
    }

    /// Validates a `CancelClaim` command. Staff skip both checks.
    fn validate_cancel(
        state: &CourseBook,
        claim: &Claim,
        actor: &Actor,
        now: DateTime<Utc>,
        env: &CourseEnvironment,
    ) -> Result<(), RejectionReason> {
        if actor.is_admin() {
            return Ok(());
        }
        if !claim.claimant.is_held_by(actor) {
            return Err(RejectionReason::NotClaimant);
        }
        let deadlines = Deadlines::for_session(&state.session, env.studio_time);
        if !deadlines.cancellation_open(now) {
            return Err(RejectionReason::CancellationClosed);
        }
        Ok(())
    }

    /// Last line of defence before a fact is applied.
    ///
    /// A failure here means a command let something through it should not have.
    fn check_invariants(state: &CourseBook, event: &CourseEvent) -> Result<(), String> {
        match event {
            CourseEvent::ClaimSeated {
                claim_id, claimant, ..
            }
            | CourseEvent::ClaimWaitlisted {
                claim_id, claimant, ..
            } => {
                if state.claim(claim_id).is_some() {
                    return Err(format!("claim {claim_id} already exists"));
                }
                if state.active_claim_of(claimant).is_some() {
                    return Err(format!("{claimant} already holds an active claim"));
                }
                if matches!(event, CourseEvent::ClaimSeated { .. }) && !state.has_free_seat() {
                    return Err(format!(
                        "seating {claim_id} would exceed capacity {}",
                        state.session.max_participants
                    ));
                }
                Ok(())
            },
            CourseEvent::ClaimPromoted { claim_id, .. } => {
                if state.has_free_seat() {
                    Ok(())
                } else {
                    Err(format!(
                        "promoting {claim_id} would exceed capacity {}",
                        state.session.max_participants
                    ))
                }
            },
            CourseEvent::ClaimsRemoved { released, .. } | CourseEvent::CourseCancelled { released, .. } => {
                match released
                    .iter()
                    .find(|r| !state.claim(&r.claim_id).is_some_and(|c| c.status.is_active()))
                {
                    Some(stale) => Err(format!("claim {} is not active", stale.claim_id)),
                    None => Ok(()),
                }
            },
            _ => Ok(()),
        }
    }

    /// Applies a fact to state. Pure; used both live and for journal replay.
    pub fn apply_event(state: &mut CourseBook, event: &CourseEvent) {
        match event {
            CourseEvent::CourseScheduled { session } => {
                state.session = session.clone();
            },
            CourseEvent::ClaimSeated {
                claim_id,
                claimant,
                at,
            } => {
                let claim = Self::new_claim(state, *claim_id, claimant, ClaimStatus::Registered, *at);
                state.push_claim(claim);
            },
            CourseEvent::ClaimWaitlisted {
                claim_id,
                claimant,
                at,
            } => {
                let claim = Self::new_claim(state, *claim_id, claimant, ClaimStatus::Waitlisted, *at);
                state.push_claim(claim);
            },
            CourseEvent::ClaimCancelled { claim_id, .. } => {
                Self::set_status(state, claim_id, ClaimStatus::Cancelled);
            },
            CourseEvent::ClaimPromoted { claim_id, .. } => {
                Self::set_status(state, claim_id, ClaimStatus::Registered);
            },
            CourseEvent::ClaimDemoted { claim_id, .. } => {
                Self::set_status(state, claim_id, ClaimStatus::Waitlisted);
            },
            CourseEvent::NoShowMarked {
                claim_id,
                marked_by,
                at,
            } => {
                if let Some(claim) = state.claim_mut(claim_id) {
                    claim.attendance = Some(AttendanceMark {
                        marked_at: *at,
                        marked_by: *marked_by,
                    });
                }
            },
            CourseEvent::NoShowCleared { claim_id } => {
                if let Some(claim) = state.claim_mut(claim_id) {
                    claim.attendance = None;
                }
            },
            CourseEvent::ClaimsRemoved { released, .. } => Self::release(state, released),
            CourseEvent::CourseCancelled {
                low_attendance,
                released,
                ..
            } => {
                if *low_attendance {
                    state.session.cancelled_due_to_low_attendance = true;
                } else {
                    state.session.is_cancelled = true;
                }
                Self::release(state, released);
            },
        }
    }

    fn release(state: &mut CourseBook, released: &[ReleasedClaim]) {
        for claim in released {
            Self::set_status(state, &claim.claim_id, ClaimStatus::Cancelled);
        }
    }

    fn new_claim(
        state: &CourseBook,
        id: ClaimId,
        claimant: &Claimant,
        status: ClaimStatus,
        at: DateTime<Utc>,
    ) -> Claim {
        Claim {
            id,
            session_id: state.session.id,
            claimant: claimant.clone(),
            status,
            registered_at: at,
            attendance: None,
        }
    }

    fn set_status(state: &mut CourseBook, claim_id: &ClaimId, status: ClaimStatus) {
        if let Some(claim) = state.claim_mut(claim_id) {
            claim.status = status;
        }
    }

    /// Creates effects for an applied fact: journal first, then credits, then notifications
    fn create_effects(state: &CourseBook, event: &CourseEvent, env: &CourseEnvironment) -> Effects {
        let mut effects: Effects = smallvec![Self::journal(state, event, env)];
        let summary = || SessionSummary::from(&state.session);

        match event {
            CourseEvent::CourseScheduled { .. } => {},
            CourseEvent::ClaimSeated { .. } => metrics::record_claim("seated"),
            CourseEvent::ClaimWaitlisted { .. } => metrics::record_claim("waitlisted"),
            CourseEvent::ClaimCancelled {
                claim_id, previous, ..
            } => {
                metrics::record_cancellation("cancelled");
                if *previous == ClaimStatus::Registered {
                    if let Some(member_id) = Self::member_of(state, claim_id) {
                        effects.push(Self::refund(env, vec![(*claim_id, member_id)]));
                    }
                }
            },
            CourseEvent::ClaimsRemoved { released, .. } => {
                effects.extend(Self::refund_released(state, released, env));
            },
            CourseEvent::ClaimPromoted { claim_id, .. } => {
                metrics::record_promotion();
                if let Some(claim) = state.claim(claim_id) {
                    effects.push(Self::notify(
                        env,
                        Notification::WaitlistPromoted {
                            claim_id: *claim_id,
                            claimant: claim.claimant.clone(),
                            session: summary(),
                        },
                    ));
                }
            },
            CourseEvent::ClaimDemoted { claim_id, .. } => {
                if let Some(member_id) = Self::member_of(state, claim_id) {
                    effects.push(Self::refund(env, vec![(*claim_id, member_id)]));
                }
            },
            CourseEvent::NoShowMarked {
                claim_id,
                marked_by,
                ..
            } => {
                metrics::record_no_show("marked");
                if let Some(member_id) = Self::member_of(state, claim_id) {
                    effects.push(Self::notify(
                        env,
                        Notification::NoShowRecorded {
                            claim_id: *claim_id,
                            member_id,
                            marked_by: *marked_by,
                            session: summary(),
                        },
                    ));
                }
            },
            CourseEvent::NoShowCleared { .. } => metrics::record_no_show("cleared"),
            CourseEvent::CourseCancelled {
                low_attendance,
                released,
                ..
            } => {
                effects.extend(Self::refund_released(state, released, env));
                let participants = released
                    .iter()
                    .filter_map(|r| state.claim(&r.claim_id))
                    .map(|c| c.claimant.clone())
                    .collect();
                let notification = if *low_attendance {
                    metrics::record_sweep_cancellation();
                    Notification::CourseCancelledLowAttendance {
                        session: summary(),
                        participants,
                    }
                } else {
                    Notification::CourseCancelled {
                        session: summary(),
                        participants,
                    }
                };
                effects.push(Self::notify(env, notification));
            },
        }

        effects
    }

    /// One refund run for every seated member among `released`
    fn refund_released(
        state: &CourseBook,
        released: &[ReleasedClaim],
        env: &CourseEnvironment,
    ) -> Option<Effect<CourseAction>> {
        let mut owed = Vec::new();
        for claim in released {
            metrics::record_cancellation("cancelled");
            if claim.previous == ClaimStatus::Registered {
                if let Some(member_id) = Self::member_of(state, &claim.claim_id) {
                    owed.push((claim.claim_id, member_id));
                }
            }
        }
        (!owed.is_empty()).then(|| Self::refund(env, owed))
    }

    fn member_of(state: &CourseBook, claim_id: &ClaimId) -> Option<MemberId> {
        state
            .claim(claim_id)
            .and_then(|claim| claim.claimant.member_id())
    }

    fn record(event: CourseEvent) -> Effect<CourseAction> {
        Effect::dispatch(CourseAction::Recorded(event))
    }

    /// Append one fact to the session's stream
    fn journal(state: &CourseBook, event: &CourseEvent, env: &CourseEnvironment) -> Effect<CourseAction> {
        let event_type = event.event_type();
        let metadata = serde_json::json!({ "session_id": state.session.id.to_string() });
        let serialized = match SerializedEvent::from_event(event, Some(metadata)) {
            Ok(serialized) => serialized,
            Err(error) => {
                return Effect::dispatch(CourseAction::JournalWriteFailed {
                    event_type: event_type.to_string(),
                    error: error.to_string(),
                });
            },
        };
        let store = Arc::clone(&env.event_store);
        let stream_id = StreamId::for_aggregate(COURSE_CATEGORY, state.session.id);

        Effect::future(async move {
            match store.append_events(stream_id, None, vec![serialized]).await {
                Ok(_) => None,
                Err(error) => Some(CourseAction::JournalWriteFailed {
                    event_type: event_type.to_string(),
                    error: error.to_string(),
                }),
            }
        })
    }

    fn debit_for_claim(
        env: &CourseEnvironment,
        claim_id: ClaimId,
        claimant: Claimant,
        member_id: MemberId,
        requested_at: DateTime<Utc>,
    ) -> Effect<CourseAction> {
        let credits = Arc::clone(&env.credits);
        Effect::future(async move {
            match credits.debit_one(member_id).await {
                Ok(DebitOutcome::Debited) => Some(CourseAction::SeatFunded {
                    claim_id,
                    claimant,
                    requested_at,
                }),
                Ok(DebitOutcome::Insufficient) => Some(CourseAction::ClaimRejected {
                    claim_id,
                    reason: RejectionReason::InsufficientCredits,
                }),
                Err(error) => {
                    tracing::warn!(claim_id = %claim_id, member_id = %member_id, %error, "Credit debit failed, seat not granted");
                    metrics::record_collaborator_failure("credits");
                    Some(CourseAction::ClaimRejected {
                        claim_id,
                        reason: RejectionReason::CreditCheckFailed,
                    })
                },
            }
        })
    }

    /// Walk the waitlist in queue order and pay for up to `seats` promotions.
    ///
    /// Guests need no credit. Members the ledger refuses are added to `skipped`
    /// and the walk moves on to the next claim.
    fn fund_promotions(
        env: &CourseEnvironment,
        session_id: SessionId,
        candidates: Vec<(ClaimId, Option<MemberId>)>,
        seats: usize,
        mut skipped: Vec<ClaimId>,
    ) -> Effect<CourseAction> {
        let credits = Arc::clone(&env.credits);
        Effect::future(async move {
            let mut funded = Vec::new();
            for (claim_id, member) in candidates {
                if funded.len() >= seats {
                    break;
                }
                let Some(member_id) = member else {
                    funded.push(claim_id);
                    continue;
                };
                let reason = match credits.debit_one(member_id).await {
                    Ok(DebitOutcome::Debited) => {
                        funded.push(claim_id);
                        continue;
                    },
                    Ok(DebitOutcome::Insufficient) => "insufficient credits".to_string(),
                    Err(error) => {
                        metrics::record_collaborator_failure("credits");
                        error.to_string()
                    },
                };
                tracing::warn!(
                    session_id = %session_id,
                    claim_id = %claim_id,
                    %reason,
                    "Promotion declined, trying the next waitlisted claim"
                );
                skipped.push(claim_id);
            }
            (!funded.is_empty()).then_some(CourseAction::PromotionFunded { funded, skipped })
        })
    }

    /// Return one credit to each member in `owed`
    fn refund(env: &CourseEnvironment, owed: Vec<(ClaimId, MemberId)>) -> Effect<CourseAction> {
        let credits = Arc::clone(&env.credits);
        Effect::future(async move {
            let mut failures = Vec::new();
            for (claim_id, member_id) in owed {
                if let Err(error) = credits.refund_one(member_id).await {
                    failures.push(FailedRefund {
                        claim_id,
                        member_id,
                        error: error.to_string(),
                    });
                }
            }
            (!failures.is_empty()).then_some(CourseAction::RefundFailed { failures })
        })
    }

    fn notify(env: &CourseEnvironment, notification: Notification) -> Effect<CourseAction> {
        let notifier = Arc::clone(&env.notifier);
        let policy = env.notify_retry.clone();
        Effect::detached(async move {
            notifications::deliver(notifier.as_ref(), &policy, notification).await;
        })
    }

    /// Call the session off together with every active claim, as one fact
    fn cascade(state: &CourseBook, low_attendance: bool, by: Actor, now: DateTime<Utc>) -> Effect<CourseAction> {
        let released = state
            .active_claims()
            .map(|claim| ReleasedClaim {
                claim_id: claim.id,
                previous: claim.status,
            })
            .collect();
        Self::record(CourseEvent::CourseCancelled {
            low_attendance,
            released,
            by,
            at: now,
        })
    }
}

impl Reducer for CourseBookReducer {
    type State = CourseBook;
    type Action = CourseAction;
    type Environment = CourseEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let now = env.clock.now();
        let session_id = state.session.id;

        match action {
            // ========== Commands ==========
            CourseAction::Schedule => smallvec![Self::record(CourseEvent::CourseScheduled {
                session: state.session.clone(),
            })],

            CourseAction::RequestClaim { claim_id, claimant } => {
                if let Err(reason) = Self::validate_claim(state, &claimant, now, env) {
                    return smallvec![Effect::dispatch(CourseAction::ClaimRejected { claim_id, reason })];
                }

                if state.overshoot() > 0 {
                    tracing::error!(
                        session_id = %session_id,
                        registered = state.registered_count(),
                        capacity = state.session.max_participants,
                        "Session is over capacity, waitlisting and reconciling"
                    );
                    metrics::record_integrity_violation();
                    return smallvec![Effect::chain(vec![
                        Self::record(CourseEvent::ClaimWaitlisted {
                            claim_id,
                            claimant,
                            at: now,
                        }),
                        Effect::dispatch(CourseAction::Reconcile),
                    ])];
                }

                if !state.has_free_seat() {
                    return smallvec![Self::record(CourseEvent::ClaimWaitlisted {
                        claim_id,
                        claimant,
                        at: now,
                    })];
                }

                match claimant.member_id() {
                    Some(member_id) => {
                        smallvec![Self::debit_for_claim(env, claim_id, claimant, member_id, now)]
                    },
                    None => smallvec![Self::record(CourseEvent::ClaimSeated {
                        claim_id,
                        claimant,
                        at: now,
                    })],
                }
            },

            CourseAction::CancelClaim { claim_id, actor } => {
                let Some(claim) = state.claim(&claim_id) else {
                    return smallvec![Effect::dispatch(CourseAction::ClaimNotFound { claim_id })];
                };
                if claim.status == ClaimStatus::Cancelled {
                    return smallvec![Effect::dispatch(CourseAction::AlreadyCancelled { claim_id })];
                }
                if let Err(reason) = Self::validate_cancel(state, claim, &actor, now, env) {
                    return smallvec![Effect::dispatch(CourseAction::CancellationRejected {
                        claim_id,
                        reason
                    })];
                }

                let previous = claim.status;
                let mut steps = vec![Self::record(CourseEvent::ClaimCancelled {
                    claim_id,
                    previous,
                    by: actor,
                    at: now,
                })];
                // A waitlisted claim never frees a seat
                if previous == ClaimStatus::Registered {
                    steps.push(Effect::dispatch(CourseAction::PromoteNext { skipped: Vec::new() }));
                }
                smallvec![Effect::chain(steps)]
            },

            CourseAction::RemoveClaims { claim_ids, admin } => {
                let mut released: Vec<ReleasedClaim> = Vec::new();
                let mut seen: Vec<ClaimId> = Vec::new();

                for claim_id in claim_ids {
                    if seen.contains(&claim_id) {
                        continue;
                    }
                    seen.push(claim_id);
                    match state.claim(&claim_id) {
                        Some(claim) if claim.status.is_active() => released.push(ReleasedClaim {
                            claim_id,
                            previous: claim.status,
                        }),
                        Some(_) => tracing::debug!(claim_id = %claim_id, "Already cancelled, skipping"),
                        None => tracing::debug!(claim_id = %claim_id, "Not part of this session, skipping"),
                    }
                }

                if released.is_empty() {
                    return SmallVec::new();
                }
                let freed_seat = released.iter().any(|r| r.previous == ClaimStatus::Registered);
                let mut steps = vec![Self::record(CourseEvent::ClaimsRemoved {
                    released,
                    by: admin,
                    at: now,
                })];
                if freed_seat {
                    steps.push(Effect::dispatch(CourseAction::PromoteNext { skipped: Vec::new() }));
                }
                smallvec![Effect::chain(steps)]
            },

            CourseAction::PromoteNext { skipped } => {
                if state.session.is_called_off() || !state.has_free_seat() {
                    return SmallVec::new();
                }
                let candidates: Vec<(ClaimId, Option<MemberId>)> = state
                    .waitlist()
                    .into_iter()
                    .filter(|c| !skipped.contains(&c.id))
                    .map(|c| (c.id, c.claimant.member_id()))
                    .collect();
                if candidates.is_empty() {
                    return SmallVec::new();
                }
                let seats = usize::try_from(state.occupancy().free_seats()).unwrap_or(usize::MAX);
                smallvec![Self::fund_promotions(env, session_id, candidates, seats, skipped)]
            },

            CourseAction::MarkNoShow { claim_id, marker } => {
                let Some(claim) = state.claim(&claim_id) else {
                    return smallvec![Effect::dispatch(CourseAction::ClaimNotFound { claim_id })];
                };
                if let Err(reason) = attendance::check_markable(state, claim, now, env.studio_time) {
                    return smallvec![Effect::dispatch(CourseAction::AttendanceRejected {
                        claim_id,
                        reason
                    })];
                }
                if claim.is_no_show() {
                    return SmallVec::new();
                }
                smallvec![Self::record(CourseEvent::NoShowMarked {
                    claim_id,
                    marked_by: marker,
                    at: now,
                })]
            },

            CourseAction::UndoNoShow { claim_id } => match state.claim(&claim_id) {
                None => smallvec![Effect::dispatch(CourseAction::ClaimNotFound { claim_id })],
                Some(claim) if claim.is_no_show() => {
                    smallvec![Self::record(CourseEvent::NoShowCleared { claim_id })]
                },
                Some(_) => SmallVec::new(),
            },

            CourseAction::CheckAttendance => {
                match sweep::assess(state, now, env.studio_time, env.minimum_participants) {
                    Viability::OutOfScope | Viability::Pending => SmallVec::new(),
                    Viability::Viable { members } => {
                        tracing::debug!(session_id = %session_id, members, "Session is viable");
                        SmallVec::new()
                    },
                    Viability::Underbooked { members } => {
                        tracing::info!(
                            session_id = %session_id,
                            members,
                            minimum = env.minimum_participants,
                            "Calling off under-booked session"
                        );
                        smallvec![Self::cascade(state, true, Actor::Scheduler, now)]
                    },
                }
            },

            CourseAction::CancelCourse { admin } => {
                if state.session.is_called_off() {
                    tracing::info!(session_id = %session_id, "Session already called off");
                    return SmallVec::new();
                }
                tracing::info!(session_id = %session_id, admin = %admin, "Calling off session");
                smallvec![Self::cascade(state, false, Actor::Admin(admin), now)]
            },

            CourseAction::Reconcile => {
                let mut steps = Vec::new();
                let overshoot = usize::try_from(state.overshoot()).unwrap_or(usize::MAX);
                if overshoot > 0 {
                    tracing::error!(
                        session_id = %session_id,
                        registered = state.registered_count(),
                        capacity = state.session.max_participants,
                        "Session over capacity, demoting the latest seats"
                    );
                    metrics::record_integrity_violation();
                    steps.extend(state.latest_seated(overshoot).into_iter().map(|claim| {
                        Self::record(CourseEvent::ClaimDemoted {
                            claim_id: claim.id,
                            at: now,
                        })
                    }));
                }
                steps.push(Effect::dispatch(CourseAction::PromoteNext { skipped: Vec::new() }));
                smallvec![Effect::chain(steps)]
            },

            // ========== Collaborator replies ==========
            CourseAction::SeatFunded {
                claim_id,
                claimant,
                requested_at,
            } => {
                if state.has_free_seat() {
                    return smallvec![Self::record(CourseEvent::ClaimSeated {
                        claim_id,
                        claimant,
                        at: requested_at,
                    })];
                }
                // Lost the seat while the debit was in flight: waitlist instead
                tracing::debug!(claim_id = %claim_id, "Seat gone after debit, waitlisting");
                let mut effects = Effects::new();
                if let Some(member_id) = claimant.member_id() {
                    effects.push(Self::refund(env, vec![(claim_id, member_id)]));
                }
                effects.push(Self::record(CourseEvent::ClaimWaitlisted {
                    claim_id,
                    claimant,
                    at: requested_at,
                }));
                effects
            },

            CourseAction::PromotionFunded { funded, skipped } => {
                let mut seats = if state.session.is_called_off() {
                    0
                } else {
                    state.occupancy().free_seats()
                };
                let mut steps = Vec::new();
                let mut owed = Vec::new();
                for claim_id in funded {
                    let still_waiting = state
                        .claim(&claim_id)
                        .is_some_and(|c| c.status == ClaimStatus::Waitlisted);
                    if still_waiting && seats > 0 {
                        seats -= 1;
                        steps.push(Self::record(CourseEvent::ClaimPromoted { claim_id, at: now }));
                    } else {
                        tracing::warn!(claim_id = %claim_id, "Promotion no longer possible, returning credit");
                        if let Some(member_id) = Self::member_of(state, &claim_id) {
                            owed.push((claim_id, member_id));
                        }
                    }
                }

                let mut effects = Effects::new();
                if !owed.is_empty() {
                    effects.push(Self::refund(env, owed));
                }
                if !steps.is_empty() {
                    steps.push(Effect::dispatch(CourseAction::PromoteNext { skipped }));
                    effects.push(Effect::chain(steps));
                }
                effects
            },

            CourseAction::RefundFailed { failures } => {
                for failure in &failures {
                    tracing::warn!(
                        session_id = %session_id,
                        claim_id = %failure.claim_id,
                        member_id = %failure.member_id,
                        error = %failure.error,
                        "Refund failed"
                    );
                    metrics::record_collaborator_failure("credits");
                }
                if let Some(last) = failures.last() {
                    state.last_error = Some(match failures.len() {
                        1 => format!("refund for {} failed: {}", last.member_id, last.error),
                        n => format!("{n} refunds failed, last for {}: {}", last.member_id, last.error),
                    });
                }
                SmallVec::new()
            },

            // ========== Outcomes ==========
            CourseAction::ClaimRejected { claim_id, reason } => {
                tracing::info!(session_id = %session_id, claim_id = %claim_id, %reason, "Claim rejected");
                metrics::record_claim("rejected");
                SmallVec::new()
            },

            CourseAction::CancellationRejected { claim_id, reason } => {
                tracing::info!(session_id = %session_id, claim_id = %claim_id, %reason, "Cancellation rejected");
                metrics::record_cancellation("rejected");
                SmallVec::new()
            },

            CourseAction::AlreadyCancelled { claim_id } => {
                tracing::info!(session_id = %session_id, claim_id = %claim_id, "Claim already cancelled");
                metrics::record_cancellation("already_cancelled");
                SmallVec::new()
            },

            CourseAction::ClaimNotFound { claim_id } => {
                tracing::debug!(session_id = %session_id, claim_id = %claim_id, "Claim not found");
                SmallVec::new()
            },

            CourseAction::AttendanceRejected { claim_id, reason } => {
                tracing::info!(session_id = %session_id, claim_id = %claim_id, %reason, "No-show not recorded");
                SmallVec::new()
            },

            CourseAction::IntegrityViolation { detail } => {
                tracing::error!(session_id = %session_id, %detail, "Integrity violation, fact rejected");
                metrics::record_integrity_violation();
                state.last_error = Some(detail);
                SmallVec::new()
            },

            CourseAction::JournalWriteFailed { event_type, error } => {
                tracing::error!(session_id = %session_id, %event_type, %error, "Failed to journal fact");
                EventStoreMetrics::record_append_failure();
                metrics::record_collaborator_failure("journal");
                state.last_error = Some(format!("journal append of {event_type} failed: {error}"));
                SmallVec::new()
            },

            // ========== Events ==========
            CourseAction::Recorded(event) => {
                if let Err(detail) = Self::check_invariants(state, &event) {
                    return smallvec![Effect::dispatch(CourseAction::IntegrityViolation { detail })];
                }
                Self::apply_event(state, &event);
                Self::create_effects(state, &event, env)
            },
        }
    }
}
