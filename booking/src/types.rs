//! Domain types for the course booking engine.
//!
//! Value objects shared by the course book aggregate, the engine facade and
//! the HTTP layer: identifiers, claimants, claims and session definitions.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a scheduled course occurrence
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random `SessionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SessionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a seat claim
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimId(Uuid);

impl ClaimId {
    /// Creates a new random `ClaimId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ClaimId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClaimId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a studio member, issued by the identity collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(Uuid);

impl MemberId {
    /// Creates a new random `MemberId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `MemberId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Claimants and actors
// ============================================================================

/// Contact details of an unauthenticated drop-in guest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestIdentity {
    /// Display name
    pub name: String,
    /// Email address; identifies the guest across claims
    pub email: String,
    /// Optional phone number for day-of contact
    pub phone: Option<String>,
}

impl GuestIdentity {
    /// Create a guest identity
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: Option<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone,
        }
    }

    /// Case-insensitive key used for duplicate detection
    #[must_use]
    pub fn key(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// Who holds a claim.
///
/// Members and guests compete for the same seats; only members carry credits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Claimant {
    /// A registered studio member
    Member(MemberId),
    /// A drop-in guest
    Guest(GuestIdentity),
}

impl Claimant {
    /// Whether this is a guest claim
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// The member id, for member claims
    #[must_use]
    pub const fn member_id(&self) -> Option<MemberId> {
        match self {
            Self::Member(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    /// Whether `other` identifies the same person
    #[must_use]
    pub fn same_person(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Member(a), Self::Member(b)) => a == b,
            (Self::Guest(a), Self::Guest(b)) => a.key() == b.key(),
            _ => false,
        }
    }

    /// Whether `actor` is the holder of this claim
    #[must_use]
    pub fn is_held_by(&self, actor: &Actor) -> bool {
        match (self, actor) {
            (Self::Member(id), Actor::Member(member)) => id == member,
            (Self::Guest(guest), Actor::Guest { email }) => guest.key() == email.trim().to_lowercase(),
            _ => false,
        }
    }
}

impl fmt::Display for Claimant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(id) => write!(f, "member:{id}"),
            Self::Guest(guest) => write!(f, "guest:{}", guest.key()),
        }
    }
}

/// Who is asking for an operation, as supplied by the identity collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// A member acting on their own behalf
    Member(MemberId),
    /// A guest identified by email
    Guest {
        /// Email the guest claimed with
        email: String,
    },
    /// Studio staff; bypasses the cancellation deadline
    Admin(MemberId),
    /// The background scheduler
    Scheduler,
}

impl Actor {
    /// Administrative actors are exempt from the cancellation deadline
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_) | Self::Scheduler)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(id) => write!(f, "member:{id}"),
            Self::Guest { email } => write!(f, "guest:{email}"),
            Self::Admin(id) => write!(f, "admin:{id}"),
            Self::Scheduler => write!(f, "scheduler"),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Lifecycle of a claim. `Cancelled` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Holds a seat
    Registered,
    /// Queued for a seat
    Waitlisted,
    /// Released; never reopened
    Cancelled,
}

impl ClaimStatus {
    /// Whether the claim still counts as an active registration
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Waitlisted => write!(f, "waitlisted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A recorded no-show
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    /// When the mark was set
    pub marked_at: DateTime<Utc>,
    /// Staff member who set it
    pub marked_by: MemberId,
}

/// One seat request against a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim identifier
    pub id: ClaimId,
    /// Session the claim is for
    pub session_id: SessionId,
    /// Holder of the claim
    pub claimant: Claimant,
    /// Current status
    pub status: ClaimStatus,
    /// When the claim was made; FIFO key for the waitlist
    pub registered_at: DateTime<Utc>,
    /// No-show mark, if any
    pub attendance: Option<AttendanceMark>,
}

impl Claim {
    /// Whether a no-show is recorded
    #[must_use]
    pub const fn is_no_show(&self) -> bool {
        self.attendance.is_some()
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// A scheduled class occurrence.
///
/// Times are wall-clock times in the studio's time zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Class title
    pub title: String,
    /// Trainer name
    pub trainer: String,
    /// Calendar date (studio local)
    pub date: NaiveDate,
    /// Start time (studio local)
    pub start_time: NaiveTime,
    /// End time (studio local)
    pub end_time: NaiveTime,
    /// Duration in minutes
    pub duration_minutes: u32,
    /// Seat capacity
    pub max_participants: u32,
    /// New claims close this many minutes before start
    pub registration_deadline_minutes: u32,
    /// Voluntary cancellation closes this many minutes before start
    pub cancellation_deadline_minutes: u32,
    /// Cancelled by staff
    pub is_cancelled: bool,
    /// Cancelled by the low-attendance sweep
    pub cancelled_due_to_low_attendance: bool,
}

impl Session {
    /// Validate a new session definition.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title must not be empty".to_string());
        }
        if self.max_participants == 0 {
            return Err("Capacity must be greater than zero".to_string());
        }
        if self.end_time <= self.start_time {
            return Err("End time must be after start time".to_string());
        }
        let scheduled = (self.end_time - self.start_time).num_minutes();
        if i64::from(self.duration_minutes) != scheduled {
            return Err(format!(
                "Duration of {} minutes does not match the {scheduled} minutes between start and end",
                self.duration_minutes
            ));
        }
        Ok(())
    }

    /// Whether the session was called off, manually or automatically
    #[must_use]
    pub const fn is_called_off(&self) -> bool {
        self.is_cancelled || self.cancelled_due_to_low_attendance
    }
}
