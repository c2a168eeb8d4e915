//! Cancelling the same claim twice changes nothing the second time.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use booking::{Actor, CancelOutcome, ClaimStatus};
use chrono::Duration;
use common::{Harness, member, session};

#[tokio::test]
async fn test_second_cancel_refunds_and_promotes_nothing() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 1)).await;
    let (holder, claimant) = member();
    let (_, waiting) = member();
    let (_, later) = member();

    let seat = h.engine.claim(session_id, claimant).await.unwrap();
    h.clock.advance(Duration::seconds(1));
    h.engine.claim(session_id, waiting).await.unwrap();
    h.clock.advance(Duration::seconds(1));
    h.engine.claim(session_id, later).await.unwrap();

    let first = h.engine.cancel(seat.claim_id, Actor::Member(holder)).await.unwrap();
    let second = h.engine.cancel(seat.claim_id, Actor::Member(holder)).await.unwrap();
    h.settle().await;

    assert!(matches!(first, CancelOutcome::Cancelled { ref promoted } if promoted.len() == 1));
    assert_eq!(second, CancelOutcome::AlreadyCancelled);
    assert_eq!(h.credits.refund_count(), 1);
    assert_eq!(h.credits.balance(holder), 10);
    assert_eq!(h.notifier.count("WaitlistPromoted"), 1);

    let occupancy = h.engine.occupancy(session_id).await.unwrap();
    assert_eq!((occupancy.registered, occupancy.waitlisted), (1, 1));
    assert_eq!(
        h.engine.claim_details(seat.claim_id).await.unwrap().status,
        ClaimStatus::Cancelled
    );
}

#[tokio::test]
async fn test_repeat_cancel_after_the_deadline_is_still_a_no_op() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 2)).await;
    let (holder, claimant) = member();
    let seat = h.engine.claim(session_id, claimant).await.unwrap();
    h.engine.cancel(seat.claim_id, Actor::Member(holder)).await.unwrap();

    h.set(common::instant("2025-03-03T17:30:00Z"));
    let again = h.engine.cancel(seat.claim_id, Actor::Member(holder)).await.unwrap();

    assert_eq!(again, CancelOutcome::AlreadyCancelled);
    assert_eq!(h.credits.refund_count(), 1);
}
