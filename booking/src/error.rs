//! Errors surfaced by the booking engine.

use crate::types::{ClaimId, SessionId};
use classbook_runtime::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a request was refused by policy.
///
/// These are expected outcomes shown to the user, never retried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The registration deadline (or the session end) has passed
    RegistrationClosed,
    /// The claimant can no longer cancel on their own
    CancellationClosed,
    /// The claimant already holds an active claim for this session
    DuplicateClaim,
    /// The session was called off
    SessionCancelled,
    /// The member has no credit left
    InsufficientCredits,
    /// The credit ledger could not be reached
    CreditCheckFailed,
    /// The actor does not hold the claim
    NotClaimant,
    /// Attendance can only be recorded on the session's own day
    NotSessionDay,
    /// Guest claims carry no attendance record
    GuestNotMarkable,
    /// Only seated claims can be marked
    NotRegistered,
    /// A session with this id is already scheduled
    DuplicateSession,
    /// The session definition is malformed
    InvalidSession(String),
}

impl RejectionReason {
    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RegistrationClosed => "REGISTRATION_CLOSED",
            Self::CancellationClosed => "CANCELLATION_CLOSED",
            Self::DuplicateClaim => "DUPLICATE_CLAIM",
            Self::SessionCancelled => "SESSION_CANCELLED",
            Self::InsufficientCredits => "INSUFFICIENT_CREDITS",
            Self::CreditCheckFailed => "CREDIT_CHECK_FAILED",
            Self::NotClaimant => "NOT_CLAIMANT",
            Self::NotSessionDay => "NOT_SESSION_DAY",
            Self::GuestNotMarkable => "GUEST_NOT_MARKABLE",
            Self::NotRegistered => "NOT_REGISTERED",
            Self::DuplicateSession => "DUPLICATE_SESSION",
            Self::InvalidSession(_) => "INVALID_SESSION",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistrationClosed => write!(f, "Registration for this class is closed"),
            Self::CancellationClosed => write!(f, "The cancellation deadline has passed"),
            Self::DuplicateClaim => write!(f, "You are already registered for this class"),
            Self::SessionCancelled => write!(f, "This class has been cancelled"),
            Self::InsufficientCredits => write!(f, "Not enough credits to book this class"),
            Self::CreditCheckFailed => write!(f, "Credits could not be checked, please try again"),
            Self::NotClaimant => write!(f, "Only the holder of a registration can cancel it"),
            Self::NotSessionDay => write!(f, "Attendance can only be recorded on the day of the class"),
            Self::GuestNotMarkable => write!(f, "Attendance is not tracked for guests"),
            Self::NotRegistered => write!(f, "Only registered participants can be marked"),
            Self::DuplicateSession => write!(f, "A class with this id already exists"),
            Self::InvalidSession(detail) => write!(f, "Invalid class definition: {detail}"),
        }
    }
}

/// Errors returned by [`Engine`](crate::engine::Engine) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Refused by policy
    #[error("{0}")]
    Rejected(RejectionReason),

    /// No session with this id
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// No claim with this id
    #[error("Claim not found: {0}")]
    ClaimNotFound(ClaimId),

    /// An invariant would have been broken; indicates a bug
    #[error("Data integrity violation: {0}")]
    IntegrityViolation(String),

    /// The aggregate runtime refused the operation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Reading the journal failed
    #[error("Journal error: {0}")]
    Journal(String),
}

impl From<RejectionReason> for BookingError {
    fn from(reason: RejectionReason) -> Self {
        Self::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_displays_user_message() {
        let err = BookingError::from(RejectionReason::RegistrationClosed);
        assert_eq!(err.to_string(), "Registration for this class is closed");
    }

    #[test]
    fn codes_are_screaming_snake_case() {
        let reason = RejectionReason::InvalidSession("no title".into());
        assert_eq!(reason.code(), "INVALID_SESSION");
        assert!(reason.to_string().ends_with("no title"));
    }
}
