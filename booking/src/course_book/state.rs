//! Course book state: one session and every claim made against it.

use crate::types::{Claim, ClaimId, ClaimStatus, Claimant, Session};
use serde::Serialize;
use std::fmt;

/// Seat usage of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    /// Seated claims, members and guests alike
    pub registered: u32,
    /// Waitlisted claims
    pub waitlisted: u32,
    /// Seat capacity
    pub capacity: u32,
}

impl Occupancy {
    /// Seats still free
    #[must_use]
    pub const fn free_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.registered)
    }
}

impl fmt::Display for Occupancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} belegt", self.registered, self.capacity)?;
        if self.waitlisted > 0 {
            write!(f, ", {} Warteliste", self.waitlisted)?;
        }
        Ok(())
    }
}

/// A waitlisted claim and its 1-based queue position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WaitlistEntry {
    /// Position in the queue, starting at 1
    pub position: usize,
    /// The claim
    pub claim: Claim,
}

/// Seated claims and the ordered waitlist of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Roster {
    /// The session
    pub session: Session,
    /// Seat usage
    pub occupancy: Occupancy,
    /// Seated claims in registration order
    pub seated: Vec<Claim>,
    /// Waitlisted claims in promotion order
    pub waitlist: Vec<WaitlistEntry>,
}

/// State of one course book aggregate.
///
/// Claims are kept in the order they were made and never removed; a
/// cancelled claim stays as a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CourseBook {
    /// The session definition and its cancellation flags
    pub session: Session,
    claims: Vec<Claim>,
    /// Last collaborator or journal error seen by this aggregate
    pub last_error: Option<String>,
}

impl CourseBook {
    /// A fresh book with no claims
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self {
            session,
            claims: Vec::new(),
            last_error: None,
        }
    }

    /// Every claim, in the order it was made
    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Look up a claim
    #[must_use]
    pub fn claim(&self, claim_id: &ClaimId) -> Option<&Claim> {
        self.claims.iter().find(|c| &c.id == claim_id)
    }

    pub(crate) fn claim_mut(&mut self, claim_id: &ClaimId) -> Option<&mut Claim> {
        self.claims.iter_mut().find(|c| &c.id == claim_id)
    }

    pub(crate) fn push_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// Claims that are registered or waitlisted
    pub fn active_claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter().filter(|c| c.status.is_active())
    }

    /// Seated claims, members and guests
    #[must_use]
    pub fn registered_count(&self) -> u32 {
        let count = self
            .claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Registered)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Seated member claims; guests are left out of the viability check
    #[must_use]
    pub fn registered_members(&self) -> usize {
        self.claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Registered && !c.claimant.is_guest())
            .count()
    }

    /// Whether a seat is free right now
    #[must_use]
    pub fn has_free_seat(&self) -> bool {
        self.registered_count() < self.session.max_participants
    }

    /// How many seated claims exceed capacity
    #[must_use]
    pub fn overshoot(&self) -> u32 {
        self.registered_count()
            .saturating_sub(self.session.max_participants)
    }

    /// The active claim held by `claimant`, if any
    #[must_use]
    pub fn active_claim_of(&self, claimant: &Claimant) -> Option<&Claim> {
        self.active_claims()
            .find(|c| c.claimant.same_person(claimant))
    }

    /// Waitlisted claims in promotion order.
    ///
    /// Earliest `registered_at` first; ties keep the order the claims were made.
    #[must_use]
    pub fn waitlist(&self) -> Vec<&Claim> {
        let mut queue: Vec<&Claim> = self
            .claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Waitlisted)
            .collect();
        queue.sort_by_key(|c| c.registered_at);
        queue
    }

    /// 1-based waitlist position of `claim_id`
    #[must_use]
    pub fn waitlist_position(&self, claim_id: &ClaimId) -> Option<usize> {
        self.waitlist()
            .iter()
            .position(|c| &c.id == claim_id)
            .map(|index| index + 1)
    }

    /// First waitlisted claim not in `skipped`
    #[must_use]
    pub fn next_waitlisted(&self, skipped: &[ClaimId]) -> Option<&Claim> {
        self.waitlist()
            .into_iter()
            .find(|c| !skipped.contains(&c.id))
    }

    /// The `count` seated claims with the latest `registered_at`, latest first
    #[must_use]
    pub fn latest_seated(&self, count: usize) -> Vec<&Claim> {
        let mut seated: Vec<(usize, &Claim)> = self
            .claims
            .iter()
            .enumerate()
            .filter(|(_, c)| c.status == ClaimStatus::Registered)
            .collect();
        seated.sort_by_key(|(index, c)| std::cmp::Reverse((c.registered_at, *index)));
        seated.into_iter().take(count).map(|(_, c)| c).collect()
    }

    /// Current seat usage
    #[must_use]
    pub fn occupancy(&self) -> Occupancy {
        let waitlisted = self
            .claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Waitlisted)
            .count();
        Occupancy {
            registered: self.registered_count(),
            waitlisted: u32::try_from(waitlisted).unwrap_or(u32::MAX),
            capacity: self.session.max_participants,
        }
    }

    /// Seated claims and the ordered waitlist
    #[must_use]
    pub fn roster(&self) -> Roster {
        Roster {
            session: self.session.clone(),
            occupancy: self.occupancy(),
            seated: self
                .claims
                .iter()
                .filter(|c| c.status == ClaimStatus::Registered)
                .cloned()
                .collect(),
            waitlist: self
                .waitlist()
                .into_iter()
                .enumerate()
                .map(|(index, claim)| WaitlistEntry {
                    position: index + 1,
                    claim: claim.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{GuestIdentity, MemberId, SessionId};
    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

    fn session(capacity: u32) -> Session {
        Session {
            id: SessionId::new(),
            title: "Spinning".into(),
            trainer: "Kai".into(),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            duration_minutes: 60,
            max_participants: capacity,
            registration_deadline_minutes: 30,
            cancellation_deadline_minutes: 60,
            is_cancelled: false,
            cancelled_due_to_low_attendance: false,
        }
    }

    fn claim(book: &CourseBook, claimant: Claimant, status: ClaimStatus, at: DateTime<Utc>) -> Claim {
        Claim {
            id: ClaimId::new(),
            session_id: book.session.id,
            claimant,
            status,
            registered_at: at,
            attendance: None,
        }
    }

    #[test]
    fn waitlist_is_fifo_by_registration_time() {
        let mut book = CourseBook::new(session(1));
        let t0 = Utc::now();
        let late = claim(&book, Claimant::Member(MemberId::new()), ClaimStatus::Waitlisted, t0 + Duration::seconds(5));
        let early = claim(&book, Claimant::Member(MemberId::new()), ClaimStatus::Waitlisted, t0);
        let (late_id, early_id) = (late.id, early.id);
        book.push_claim(late);
        book.push_claim(early);

        assert_eq!(book.waitlist_position(&early_id), Some(1));
        assert_eq!(book.waitlist_position(&late_id), Some(2));
        assert_eq!(book.next_waitlisted(&[]).map(|c| c.id), Some(early_id));
        assert_eq!(book.next_waitlisted(&[early_id]).map(|c| c.id), Some(late_id));
    }

    #[test]
    fn guests_fill_seats_but_not_the_member_count() {
        let mut book = CourseBook::new(session(2));
        let now = Utc::now();
        let guest = Claimant::Guest(GuestIdentity::new("Lu", "lu@example.com", None));
        let seated_guest = claim(&book, guest, ClaimStatus::Registered, now);
        let seated_member = claim(&book, Claimant::Member(MemberId::new()), ClaimStatus::Registered, now);
        book.push_claim(seated_guest);
        book.push_claim(seated_member);

        assert_eq!(book.registered_count(), 2);
        assert_eq!(book.registered_members(), 1);
        assert!(!book.has_free_seat());
    }

    #[test]
    fn occupancy_renders_studio_wording() {
        let occupancy = Occupancy {
            registered: 2,
            waitlisted: 3,
            capacity: 2,
        };
        assert_eq!(occupancy.to_string(), "2/2 belegt, 3 Warteliste");
        assert_eq!(
            Occupancy { waitlisted: 0, ..occupancy }.to_string(),
            "2/2 belegt"
        );
    }

    #[test]
    fn latest_seated_picks_newest_first() {
        let mut book = CourseBook::new(session(1));
        let t0 = Utc::now();
        let first = claim(&book, Claimant::Member(MemberId::new()), ClaimStatus::Registered, t0);
        let second = claim(&book, Claimant::Member(MemberId::new()), ClaimStatus::Registered, t0 + Duration::seconds(1));
        let second_id = second.id;
        book.push_claim(first);
        book.push_claim(second);

        assert_eq!(book.overshoot(), 1);
        let demote: Vec<ClaimId> = book.latest_seated(1).iter().map(|c| c.id).collect();
        assert_eq!(demote, vec![second_id]);
    }
}
