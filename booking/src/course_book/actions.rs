//! Commands, collaborator replies, outcomes and journal facts of a course book.

use crate::error::RejectionReason;
use crate::types::{Actor, ClaimId, ClaimStatus, Claimant, MemberId, Session};
use chrono::{DateTime, Utc};
use classbook_core::event::Event;
use serde::{Deserialize, Serialize};

/// Facts journaled to the `course-<session_id>` stream.
///
/// Replaying them through `CourseBookReducer::apply_event` rebuilds the book
/// without re-running any side effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseEvent {
    /// The session was put on the calendar
    CourseScheduled {
        /// Full definition
        session: Session,
    },
    /// A claim took a seat
    ClaimSeated {
        /// New claim
        claim_id: ClaimId,
        /// Holder
        claimant: Claimant,
        /// Claim time
        at: DateTime<Utc>,
    },
    /// A claim joined the waitlist
    ClaimWaitlisted {
        /// New claim
        claim_id: ClaimId,
        /// Holder
        claimant: Claimant,
        /// Claim time
        at: DateTime<Utc>,
    },
    /// A claim was released
    ClaimCancelled {
        /// Released claim
        claim_id: ClaimId,
        /// Status before release
        previous: ClaimStatus,
        /// Who released it
        by: Actor,
        /// Release time
        at: DateTime<Utc>,
    },
    /// A waitlisted claim got a seat
    ClaimPromoted {
        /// Promoted claim
        claim_id: ClaimId,
        /// Promotion time
        at: DateTime<Utc>,
    },
    /// A seated claim went back to the waitlist to restore capacity
    ClaimDemoted {
        /// Demoted claim
        claim_id: ClaimId,
        /// Demotion time
        at: DateTime<Utc>,
    },
    /// A no-show was recorded
    NoShowMarked {
        /// Marked claim
        claim_id: ClaimId,
        /// Staff member
        marked_by: MemberId,
        /// Mark time
        at: DateTime<Utc>,
    },
    /// A no-show mark was removed
    NoShowCleared {
        /// Cleared claim
        claim_id: ClaimId,
    },
    /// Staff released several claims at once
    ClaimsRemoved {
        /// Claims released, in request order
        released: Vec<ReleasedClaim>,
        /// Staff member
        by: MemberId,
        /// Release time
        at: DateTime<Utc>,
    },
    /// The session was called off, releasing every active claim with it
    CourseCancelled {
        /// Set by the low-attendance sweep
        low_attendance: bool,
        /// Claims that were active when the session was called off
        released: Vec<ReleasedClaim>,
        /// Who called it off
        by: Actor,
        /// Cancellation time
        at: DateTime<Utc>,
    },
}

/// A claim released as part of a bulk fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedClaim {
    /// Released claim
    pub claim_id: ClaimId,
    /// Status before release
    pub previous: ClaimStatus,
}

impl CourseEvent {
    /// Claims this fact releases
    #[must_use]
    pub fn released_claims(&self) -> Vec<ClaimId> {
        match self {
            Self::ClaimCancelled { claim_id, .. } => vec![*claim_id],
            Self::ClaimsRemoved { released, .. } | Self::CourseCancelled { released, .. } => {
                released.iter().map(|r| r.claim_id).collect()
            },
            _ => Vec::new(),
        }
    }
}

impl Event for CourseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::CourseScheduled { .. } => "CourseScheduled.v1",
            Self::ClaimSeated { .. } => "ClaimSeated.v1",
            Self::ClaimWaitlisted { .. } => "ClaimWaitlisted.v1",
            Self::ClaimCancelled { .. } => "ClaimCancelled.v1",
            Self::ClaimPromoted { .. } => "ClaimPromoted.v1",
            Self::ClaimDemoted { .. } => "ClaimDemoted.v1",
            Self::NoShowMarked { .. } => "NoShowMarked.v1",
            Self::NoShowCleared { .. } => "NoShowCleared.v1",
            Self::ClaimsRemoved { .. } => "ClaimsRemoved.v1",
            Self::CourseCancelled { .. } => "CourseCancelled.v1",
        }
    }
}

/// Everything a course book reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CourseAction {
    // Commands
    /// Journal the session definition the book was created with
    Schedule,
    /// Ask for a seat
    RequestClaim {
        /// Id for the new claim
        claim_id: ClaimId,
        /// Who is asking
        claimant: Claimant,
    },
    /// Release one claim
    CancelClaim {
        /// Claim to release
        claim_id: ClaimId,
        /// Who is asking
        actor: Actor,
    },
    /// Staff bulk removal, followed by one promotion run
    RemoveClaims {
        /// Claims to release
        claim_ids: Vec<ClaimId>,
        /// Staff member
        admin: MemberId,
    },
    /// Fill free seats from the waitlist
    PromoteNext {
        /// Claims whose promotion failed in this run
        skipped: Vec<ClaimId>,
    },
    /// Record a no-show
    MarkNoShow {
        /// Claim to mark
        claim_id: ClaimId,
        /// Staff member
        marker: MemberId,
    },
    /// Remove a no-show mark
    UndoNoShow {
        /// Claim to clear
        claim_id: ClaimId,
    },
    /// Low-attendance check run by the scheduler
    CheckAttendance,
    /// Staff calls off the session
    CancelCourse {
        /// Staff member
        admin: MemberId,
    },
    /// Restore capacity after an overshoot, then promote
    Reconcile,

    // Collaborator replies
    /// The debit for a new claim went through
    SeatFunded {
        /// New claim
        claim_id: ClaimId,
        /// Holder
        claimant: Claimant,
        /// Original request time
        requested_at: DateTime<Utc>,
    },
    /// Waitlisted claims whose promotion is paid for, in queue order
    PromotionFunded {
        /// Claims to promote
        funded: Vec<ClaimId>,
        /// Claims skipped so far in this run
        skipped: Vec<ClaimId>,
    },
    /// Some refunds could not be made
    RefundFailed {
        /// One entry per failed refund
        failures: Vec<FailedRefund>,
    },

    // Outcomes
    /// The claim request was refused
    ClaimRejected {
        /// Refused claim id
        claim_id: ClaimId,
        /// Why
        reason: RejectionReason,
    },
    /// The cancellation was refused
    CancellationRejected {
        /// Claim that stays active
        claim_id: ClaimId,
        /// Why
        reason: RejectionReason,
    },
    /// The claim had already been released
    AlreadyCancelled {
        /// The claim
        claim_id: ClaimId,
    },
    /// The claim does not belong to this book
    ClaimNotFound {
        /// Unknown id
        claim_id: ClaimId,
    },
    /// Attendance could not be recorded
    AttendanceRejected {
        /// The claim
        claim_id: ClaimId,
        /// Why
        reason: RejectionReason,
    },
    /// An invariant was found broken
    IntegrityViolation {
        /// What was wrong
        detail: String,
    },
    /// A fact could not be journaled
    JournalWriteFailed {
        /// Fact type
        event_type: String,
        /// Journal error
        error: String,
    },

    // Events
    /// A fact to apply and journal
    Recorded(CourseEvent),
}

/// A credit the ledger did not take back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedRefund {
    /// Released claim
    pub claim_id: ClaimId,
    /// Member owed a credit
    pub member_id: MemberId,
    /// Ledger error
    pub error: String,
}

impl CourseAction {
    /// The fact carried by this action, if it is one
    #[must_use]
    pub const fn as_event(&self) -> Option<&CourseEvent> {
        match self {
            Self::Recorded(event) => Some(event),
            _ => None,
        }
    }
}
