//! Caller identity extractor.
//!
//! The upstream identity service authenticates the caller and forwards who
//! they are in headers:
//!
//! - `x-member-id`: member UUID
//! - `x-admin: true`: the member is studio staff
//! - `x-guest-email`: a guest acting on their own claim
//!
//! No authentication happens here.

use super::error::AppError;
use crate::types::{Actor, MemberId};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Member id header
pub const MEMBER_HEADER: &str = "x-member-id";
/// Staff flag header
pub const ADMIN_HEADER: &str = "x-admin";
/// Guest email header
pub const GUEST_HEADER: &str = "x-guest-email";

/// Who is calling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Member id, if a member is calling
    pub member_id: Option<MemberId>,
    /// Whether the member is staff
    pub admin: bool,
    /// Guest email, if a guest is calling
    pub guest_email: Option<String>,
}

impl Identity {
    /// The actor for domain operations.
    ///
    /// # Errors
    ///
    /// Returns 401 if the request carries no identity.
    pub fn actor(&self) -> Result<Actor, AppError> {
        match (self.member_id, &self.guest_email) {
            (Some(id), _) if self.admin => Ok(Actor::Admin(id)),
            (Some(id), _) => Ok(Actor::Member(id)),
            (None, Some(email)) => Ok(Actor::Guest {
                email: email.clone(),
            }),
            (None, None) => Err(AppError::unauthorized("Missing caller identity")),
        }
    }

    /// The calling member.
    ///
    /// # Errors
    ///
    /// Returns 401 if no member id was supplied.
    pub fn member(&self) -> Result<MemberId, AppError> {
        self.member_id
            .ok_or_else(|| AppError::unauthorized("Member identity required"))
    }

    /// The calling staff member.
    ///
    /// # Errors
    ///
    /// Returns 401 without a member id and 403 for non-staff members.
    pub fn admin(&self) -> Result<MemberId, AppError> {
        let member = self.member()?;
        if self.admin {
            Ok(member)
        } else {
            Err(AppError::forbidden("Staff access required"))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        let member_id = header(MEMBER_HEADER)
            .map(|raw| {
                Uuid::parse_str(&raw)
                    .map(MemberId::from_uuid)
                    .map_err(|_| AppError::bad_request(format!("Invalid {MEMBER_HEADER} header")))
            })
            .transpose()?;
        let admin = header(ADMIN_HEADER).is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(Self {
            member_id,
            admin,
            guest_email: header(GUEST_HEADER),
        })
    }
}
