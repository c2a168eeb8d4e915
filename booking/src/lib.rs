//! # Booking
//!
//! Course capacity and waitlist lifecycle engine for group fitness classes.
//!
//! Members and guests claim seats in scheduled sessions. The engine:
//!
//! - seats a claim while capacity remains, debiting one member credit, and
//!   otherwise appends it to a FIFO waitlist
//! - promotes the earliest waitlisted claim whenever a seat frees
//! - enforces the registration and cancellation deadlines in studio time
//! - records no-shows on the session day
//! - calls off sessions that close registration with too few members
//!
//! Each session is one [`course_book`] aggregate behind its own lock in a
//! [`classbook_runtime::KeyedStore`]; [`engine::Engine`] is the entry point.
//!
//! ## Example
//!
//! ```ignore
//! use booking::{Engine, CourseEnvironment, Claimant};
//!
//! let engine = Engine::new(environment);
//! engine.schedule(session).await?;
//! let outcome = engine.claim(session.id, Claimant::Member(member_id)).await?;
//! println!("{} ({})", outcome.status, outcome.occupancy);
//! ```

#![forbid(unsafe_code)]

pub mod api;
pub mod attendance;
pub mod config;
pub mod course_book;
pub mod credits;
pub mod deadlines;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod notifications;
pub mod scheduler;
pub mod sweep;
pub mod types;

pub use config::Config;
pub use course_book::{
    CourseAction, CourseBook, CourseEnvironment, CourseEvent, Occupancy, ReleasedClaim, Roster,
};
pub use credits::{CreditLedger, InMemoryCreditLedger};
pub use deadlines::StudioTime;
pub use engine::{CancelOutcome, ClaimOutcome, Engine, SeatChanges};
pub use error::{BookingError, RejectionReason};
pub use notifications::{LoggingNotifier, Notification, Notifier, RecordingNotifier};
pub use sweep::SweepSummary;
pub use types::{Actor, Claim, ClaimId, ClaimStatus, Claimant, GuestIdentity, MemberId, Session, SessionId};
