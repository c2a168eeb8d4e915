//! Course book aggregate.
//!
//! One course book per scheduled session. It owns the session definition and
//! every claim made against it, and is the only place seats change hands.
//!
//! # Commands
//!
//! - `Schedule` journals the session definition
//! - `RequestClaim` seats, waitlists or rejects a claimant
//! - `CancelClaim` / `RemoveClaims` release claims and promote from the waitlist
//! - `MarkNoShow` / `UndoNoShow` record attendance on the session day
//! - `CheckAttendance` calls off under-booked sessions once registration closes
//! - `CancelCourse` calls off a session on staff request
//! - `Reconcile` demotes over-capacity seats and refills free ones
//!
//! # Facts
//!
//! Every state change is a [`CourseEvent`]. Facts are applied by
//! [`CourseBookReducer::apply_event`] both live and when replaying the journal.

mod actions;
mod environment;
mod reducer;
mod state;

pub use actions::{CourseAction, CourseEvent, FailedRefund, ReleasedClaim};
pub use environment::{CourseEnvironment, MINIMUM_PARTICIPANTS};
pub use reducer::{COURSE_CATEGORY, CourseBookReducer};
pub use state::{CourseBook, Occupancy, Roster, WaitlistEntry};
