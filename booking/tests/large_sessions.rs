//! Sessions with more claims than one transaction can feed back actions.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use booking::{Actor, CancelOutcome, ClaimId, ClaimStatus, MemberId, Notification, SessionId};
use chrono::Duration;
use common::{Harness, guest, instant, member, session};

const MORNING: &str = "2025-03-03T08:00:00Z";
const CROWD: u32 = 1100;

/// Seat `count` guests and return their claim ids
async fn fill_with_guests(h: &Harness, session_id: SessionId, count: u32) -> Vec<ClaimId> {
    let mut claims = Vec::new();
    for n in 0..count {
        let outcome = h
            .engine
            .claim(session_id, guest(&format!("guest{n}@example.com")))
            .await
            .unwrap();
        assert_eq!(outcome.status, ClaimStatus::Registered);
        claims.push(outcome.claim_id);
    }
    claims
}

#[tokio::test]
async fn test_calling_off_a_crowded_session_releases_every_claim() {
    let h = Harness::at(MORNING);
    let session_id = h.schedule(session("2025-03-03", "18:00", CROWD)).await;
    let mut members = Vec::new();
    for _ in 0..100 {
        let (id, claimant) = member();
        h.engine.claim(session_id, claimant).await.unwrap();
        members.push(id);
    }
    fill_with_guests(&h, session_id, CROWD - 100).await;

    let changes = h.engine.cancel_course(session_id, MemberId::new()).await.unwrap();
    h.settle().await;

    assert_eq!(changes.cancelled.len(), CROWD as usize);
    assert!(changes.promoted.is_empty());
    let occupancy = h.engine.occupancy(session_id).await.unwrap();
    assert_eq!(occupancy.registered, 0);
    assert_eq!(occupancy.waitlisted, 0);
    assert_eq!(h.credits.refund_count(), 100);
    assert!(members.iter().all(|m| h.credits.balance(*m) == 10));

    assert_eq!(h.notifier.count("CourseCancelled"), 1);
    match &h.notifier.sent()[0] {
        Notification::CourseCancelled { participants, .. } => {
            assert_eq!(participants.len(), CROWD as usize);
        },
        other => panic!("unexpected notification {other:?}"),
    }

    let again = h.engine.cancel_course(session_id, MemberId::new()).await.unwrap();
    assert!(again.cancelled.is_empty());
    assert_eq!(h.notifier.count("CourseCancelled"), 1);
}

#[tokio::test]
async fn test_sweep_calls_off_a_crowded_guest_session() {
    let h = Harness::at(MORNING);
    let session_id = h.schedule(session("2025-03-03", "18:00", CROWD)).await;
    fill_with_guests(&h, session_id, CROWD).await;

    h.set(instant("2025-03-03T17:01:00Z"));
    let summary = h.engine.sweep_low_attendance().await;
    h.settle().await;

    assert_eq!(summary.cancelled, vec![session_id]);
    assert_eq!(h.engine.occupancy(session_id).await.unwrap().registered, 0);
    assert!(h.engine.session(session_id).await.unwrap().cancelled_due_to_low_attendance);
    assert_eq!(h.notifier.count("CourseCancelledLowAttendance"), 1);
}

#[tokio::test]
async fn test_bulk_removal_of_a_crowd_refills_from_the_waitlist() {
    let h = Harness::at(MORNING);
    let session_id = h.schedule(session("2025-03-03", "18:00", CROWD)).await;
    let seated = fill_with_guests(&h, session_id, CROWD).await;
    let mut queue = Vec::new();
    for n in 0..3 {
        h.clock.advance(Duration::minutes(1));
        let claim = h
            .engine
            .claim(session_id, guest(&format!("late{n}@example.com")))
            .await
            .unwrap();
        queue.push(claim.claim_id);
    }

    let changes = h
        .engine
        .remove_claims(session_id, seated.clone(), MemberId::new())
        .await
        .unwrap();

    assert_eq!(changes.cancelled, seated);
    assert_eq!(changes.promoted, queue);
    assert_eq!(h.engine.occupancy(session_id).await.unwrap().registered, 3);
}

#[tokio::test]
async fn test_promotion_walks_past_a_long_run_of_members_without_credits() {
    let h = Harness::at(MORNING);
    let session_id = h.schedule(session("2025-03-03", "18:00", 1)).await;
    let seat = h.engine.claim(session_id, guest("seat@example.com")).await.unwrap();
    let mut broke = Vec::new();
    for _ in 0..600 {
        let (id, claimant) = member();
        h.credits.set_balance(id, 0);
        h.engine.claim(session_id, claimant).await.unwrap();
        broke.push(id);
    }
    h.clock.advance(Duration::minutes(1));
    let last = h.engine.claim(session_id, guest("last@example.com")).await.unwrap();

    let outcome = h.engine.cancel(seat.claim_id, Actor::Scheduler).await.unwrap();

    assert_eq!(
        outcome,
        CancelOutcome::Cancelled {
            promoted: vec![last.claim_id]
        }
    );
    assert_eq!(h.credits.debit_count(), 0);
    assert!(broke.iter().all(|m| h.credits.balance(*m) == 0));
    let roster = h.engine.roster(session_id).await.unwrap();
    assert_eq!(roster.seated[0].id, last.claim_id);
    assert_eq!(roster.waitlist.len(), 600);
}
