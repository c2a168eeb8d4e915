//! Attendance guard.
//!
//! A no-show can only be recorded on the session's own calendar day, in studio
//! time, and only for a seated member. Clearing a mark is an administrative
//! correction and has no such window.

use crate::course_book::CourseBook;
use crate::deadlines::StudioTime;
use crate::error::RejectionReason;
use crate::types::{Claim, ClaimStatus};
use chrono::{DateTime, Utc};

/// Check whether `claim` in `book` may be marked as a no-show at `now`.
///
/// # Errors
///
/// Returns the [`RejectionReason`] for the first failed condition.
pub fn check_markable(
    book: &CourseBook,
    claim: &Claim,
    now: DateTime<Utc>,
    studio: StudioTime,
) -> Result<(), RejectionReason> {
    if studio.today(now) != book.session.date {
        return Err(RejectionReason::NotSessionDay);
    }
    if claim.claimant.is_guest() {
        return Err(RejectionReason::GuestNotMarkable);
    }
    if claim.status != ClaimStatus::Registered {
        return Err(RejectionReason::NotRegistered);
    }
    Ok(())
}
