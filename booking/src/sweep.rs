//! Low-attendance viability check.
//!
//! Once a session's registration deadline has passed, it must hold at least
//! the configured number of seated members. Guest seats do not count.

use crate::course_book::CourseBook;
use crate::deadlines::{Deadlines, StudioTime};
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Verdict of the viability check for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Viability {
    /// Already called off, or in the past
    OutOfScope,
    /// Registration is still open
    Pending,
    /// Enough members are seated
    Viable {
        /// Seated members
        members: usize,
    },
    /// Too few members are seated; the session must be called off
    Underbooked {
        /// Seated members
        members: usize,
    },
}

/// Whether the sweep looks at this session at all.
#[must_use]
pub fn in_scope(book: &CourseBook, now: DateTime<Utc>, studio: StudioTime) -> bool {
    !book.session.is_called_off() && book.session.date >= studio.today(now)
}

/// Assess one session at `now`.
#[must_use]
pub fn assess(
    book: &CourseBook,
    now: DateTime<Utc>,
    studio: StudioTime,
    minimum: usize,
) -> Viability {
    if !in_scope(book, now, studio) {
        return Viability::OutOfScope;
    }
    let deadlines = Deadlines::for_session(&book.session, studio);
    if now < deadlines.registration {
        return Viability::Pending;
    }
    let members = book.registered_members();
    if members < minimum {
        Viability::Underbooked { members }
    } else {
        Viability::Viable { members }
    }
}

/// Result of one sweep over every session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Sessions that were in scope
    pub checked: usize,
    /// Sessions called off in this run
    pub cancelled: Vec<SessionId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Session, SessionId};
    use chrono::{Duration, NaiveDate, NaiveTime};

    fn book() -> CourseBook {
        CourseBook::new(Session {
            id: SessionId::new(),
            title: "HIIT".into(),
            trainer: "Sam".into(),
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            duration_minutes: 60,
            max_participants: 8,
            registration_deadline_minutes: 60,
            cancellation_deadline_minutes: 120,
            is_cancelled: false,
            cancelled_due_to_low_attendance: false,
        })
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-09-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn waits_for_the_registration_deadline() {
        let book = book();
        let before = start() - Duration::minutes(61);
        assert_eq!(assess(&book, before, StudioTime::utc(), 3), Viability::Pending);

        let at_deadline = start() - Duration::minutes(60);
        assert_eq!(
            assess(&book, at_deadline, StudioTime::utc(), 3),
            Viability::Underbooked { members: 0 }
        );
    }

    #[test]
    fn flagged_and_past_sessions_are_out_of_scope() {
        let mut flagged = book();
        flagged.session.cancelled_due_to_low_attendance = true;
        assert_eq!(assess(&flagged, start(), StudioTime::utc(), 3), Viability::OutOfScope);

        let next_day = start() + Duration::days(1);
        assert_eq!(assess(&book(), next_day, StudioTime::utc(), 3), Viability::OutOfScope);
    }

    #[test]
    fn zero_minimum_is_always_viable() {
        assert_eq!(
            assess(&book(), start(), StudioTime::utc(), 0),
            Viability::Viable { members: 0 }
        );
    }
}
