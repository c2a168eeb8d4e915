//! Claim endpoints.
//!
//! - GET /api/claims/:id - a single claim
//! - DELETE /api/claims/:id - cancel a claim (holder or staff)
//! - POST /api/claims/:id/no-show - record a no-show (staff)
//! - DELETE /api/claims/:id/no-show - clear a no-show (staff)

use super::error::AppError;
use super::identity::Identity;
use super::state::AppState;
use crate::engine::CancelOutcome;
use crate::types::{Claim, ClaimId};
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

/// Get a claim.
pub async fn get_claim(
    Path(claim_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Claim>, AppError> {
    let claim = state.engine.claim_details(ClaimId::from_uuid(claim_id)).await?;
    Ok(Json(claim))
}

/// Cancel a claim.
///
/// Repeating the call is harmless and answers `already_cancelled`.
///
/// ```bash
/// curl -X DELETE http://localhost:8080/api/claims/$CLAIM -H 'x-guest-email: ana@example.com'
/// # {"result":"cancelled","promoted":["..."]}
/// ```
pub async fn cancel_claim(
    Path(claim_id): Path<Uuid>,
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<CancelOutcome>, AppError> {
    let actor = identity.actor()?;
    let outcome = state
        .engine
        .cancel(ClaimId::from_uuid(claim_id), actor)
        .await?;
    Ok(Json(outcome))
}

/// Record a no-show.
pub async fn mark_no_show(
    Path(claim_id): Path<Uuid>,
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Claim>, AppError> {
    let marker = identity.admin()?;
    let claim = state
        .engine
        .mark_no_show(ClaimId::from_uuid(claim_id), marker)
        .await?;
    Ok(Json(claim))
}

/// Clear a no-show.
pub async fn undo_no_show(
    Path(claim_id): Path<Uuid>,
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Claim>, AppError> {
    identity.admin()?;
    let claim = state.engine.undo_no_show(ClaimId::from_uuid(claim_id)).await?;
    Ok(Json(claim))
}
