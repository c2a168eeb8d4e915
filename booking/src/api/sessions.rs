//! Session endpoints.
//!
//! - POST /api/sessions - schedule a session (staff)
//! - GET /api/sessions/:id - session and occupancy
//! - GET /api/sessions/:id/roster - seated claims and waitlist
//! - POST /api/sessions/:id/claims - claim a seat (member or guest)
//! - POST /api/sessions/:id/removals - remove several claims (staff)
//! - POST /api/sessions/:id/cancel - call the session off (staff)
//! - POST /api/sessions/:id/reconcile - fix over-capacity seats (staff)
//! - POST /api/sweeps/low-attendance - run the low-attendance sweep

use super::error::AppError;
use super::identity::Identity;
use super::state::AppState;
use crate::course_book::{Occupancy, Roster};
use crate::engine::{ClaimOutcome, SeatChanges};
use crate::sweep::SweepSummary;
use crate::types::{ClaimId, Claimant, GuestIdentity, Session, SessionId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Request body for scheduling a session.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    /// Client-chosen id; generated when absent
    pub id: Option<Uuid>,
    /// Class title
    pub title: String,
    /// Trainer name
    pub trainer: String,
    /// Studio-local date
    pub date: NaiveDate,
    /// Studio-local start time
    pub start_time: NaiveTime,
    /// Studio-local end time
    pub end_time: NaiveTime,
    /// Seat capacity
    pub max_participants: u32,
    /// Minutes before start at which registration closes
    pub registration_deadline_minutes: u32,
    /// Minutes before start at which self-cancellation closes
    pub cancellation_deadline_minutes: u32,
}

impl ScheduleRequest {
    fn into_session(self) -> Session {
        let minutes = (self.end_time - self.start_time).num_minutes();
        Session {
            id: self.id.map_or_else(SessionId::new, SessionId::from_uuid),
            title: self.title,
            trainer: self.trainer,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: u32::try_from(minutes).unwrap_or(0),
            max_participants: self.max_participants,
            registration_deadline_minutes: self.registration_deadline_minutes,
            cancellation_deadline_minutes: self.cancellation_deadline_minutes,
            is_cancelled: false,
            cancelled_due_to_low_attendance: false,
        }
    }
}

/// Request body for claiming a seat.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimRequest {
    /// The calling member claims a seat for themselves
    Member,
    /// A guest claims a seat
    Guest {
        /// Guest name
        name: String,
        /// Guest email; identifies the guest for duplicates and cancellation
        email: String,
        /// Optional phone number
        phone: Option<String>,
    },
}

/// Request body for bulk removal.
#[derive(Debug, Deserialize)]
pub struct RemovalRequest {
    /// Claims to cancel
    pub claim_ids: Vec<Uuid>,
}

/// Session with its current occupancy.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// The session
    pub session: Session,
    /// Seat usage
    pub occupancy: Occupancy,
    /// Human-readable occupancy, e.g. "2/2 belegt, 3 Warteliste"
    pub occupancy_label: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Schedule a new session.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/sessions \
///   -H 'x-member-id: 550e8400-e29b-41d4-a716-446655440000' -H 'x-admin: true' \
///   -H 'content-type: application/json' \
///   -d '{"title":"Yoga","trainer":"Mia","date":"2025-03-03","start_time":"18:00:00",
///        "end_time":"19:00:00","max_participants":12,
///        "registration_deadline_minutes":60,"cancellation_deadline_minutes":120}'
/// ```
pub async fn schedule_session(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    identity.admin()?;
    let session = state.engine.schedule(request.into_session()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Get a session and its occupancy.
pub async fn get_session(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, AppError> {
    let session_id = SessionId::from_uuid(session_id);
    let session = state.engine.session(session_id).await?;
    let occupancy = state.engine.occupancy(session_id).await?;
    Ok(Json(SessionResponse {
        session,
        occupancy,
        occupancy_label: occupancy.to_string(),
    }))
}

/// Seated claims and the ordered waitlist.
pub async fn get_roster(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Roster>, AppError> {
    let roster = state.engine.roster(SessionId::from_uuid(session_id)).await?;
    Ok(Json(roster))
}

/// Claim a seat.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/sessions/$SESSION/claims \
///   -H 'content-type: application/json' \
///   -d '{"kind":"guest","name":"Ana","email":"ana@example.com"}'
/// # {"claim_id":"...","status":"registered","occupancy":{...},"waitlist_position":null}
/// ```
pub async fn create_claim(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<ClaimRequest>,
) -> Result<(StatusCode, Json<ClaimOutcome>), AppError> {
    let claimant = match request {
        ClaimRequest::Member => Claimant::Member(identity.member()?),
        ClaimRequest::Guest { name, email, phone } => {
            if email.trim().is_empty() {
                return Err(AppError::bad_request("Guest email is required"));
            }
            Claimant::Guest(GuestIdentity::new(name, email, phone))
        },
    };

    let outcome = state
        .engine
        .claim(SessionId::from_uuid(session_id), claimant)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Remove several claims on behalf of staff.
pub async fn remove_claims(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<RemovalRequest>,
) -> Result<Json<SeatChanges>, AppError> {
    let admin = identity.admin()?;
    let claim_ids = request.claim_ids.into_iter().map(ClaimId::from_uuid).collect();
    let changes = state
        .engine
        .remove_claims(SessionId::from_uuid(session_id), claim_ids, admin)
        .await?;
    Ok(Json(changes))
}

/// Call a session off.
pub async fn cancel_session(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<SeatChanges>, AppError> {
    let admin = identity.admin()?;
    let changes = state
        .engine
        .cancel_course(SessionId::from_uuid(session_id), admin)
        .await?;
    Ok(Json(changes))
}

/// Demote over-capacity seats and refill free ones.
pub async fn reconcile_session(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<SeatChanges>, AppError> {
    identity.admin()?;
    let changes = state.engine.reconcile(SessionId::from_uuid(session_id)).await?;
    Ok(Json(changes))
}

/// Run the low-attendance sweep now.
///
/// Takes no arguments so an external scheduler can call it as is; the sweep
/// is idempotent.
pub async fn run_sweep(State(state): State<AppState>) -> Json<SweepSummary> {
    Json(state.engine.sweep_low_attendance().await)
}
