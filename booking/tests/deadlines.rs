//! Registration and cancellation windows close exactly at their deadlines.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use booking::{Actor, BookingError, MemberId, RejectionReason, StudioTime};
use common::{Harness, guest, instant, member, session};

// Class at 18:00 UTC: registration closes 17:00, cancellation 16:00.

#[tokio::test]
async fn test_claim_one_second_before_registration_closes() {
    let h = Harness::at("2025-03-03T16:59:59Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 5)).await;

    assert!(h.engine.claim(session_id, member().1).await.is_ok());
}

#[tokio::test]
async fn test_claim_at_the_registration_deadline_is_rejected() {
    let h = Harness::at("2025-03-03T17:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 5)).await;

    assert_eq!(
        h.engine.claim(session_id, member().1).await,
        Err(BookingError::Rejected(RejectionReason::RegistrationClosed))
    );
    assert_eq!(h.credits.debit_count(), 0);
}

#[tokio::test]
async fn test_finished_session_refuses_claims() {
    let h = Harness::at("2025-03-04T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 5)).await;

    assert_eq!(
        h.engine.claim(session_id, guest("late@example.com")).await,
        Err(BookingError::Rejected(RejectionReason::RegistrationClosed))
    );
}

#[tokio::test]
async fn test_cancellation_window_boundary() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 5)).await;
    let (early, early_claimant) = member();
    let (late, late_claimant) = member();
    let early_seat = h.engine.claim(session_id, early_claimant).await.unwrap();
    let late_seat = h.engine.claim(session_id, late_claimant).await.unwrap();

    h.set(instant("2025-03-03T15:59:59Z"));
    assert!(h.engine.cancel(early_seat.claim_id, Actor::Member(early)).await.is_ok());

    h.set(instant("2025-03-03T16:00:00Z"));
    assert_eq!(
        h.engine.cancel(late_seat.claim_id, Actor::Member(late)).await,
        Err(BookingError::Rejected(RejectionReason::CancellationClosed))
    );
    assert_eq!(h.credits.balance(late), 9, "no refund for a refused cancellation");
}

#[tokio::test]
async fn test_staff_cancel_after_the_deadline() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 5)).await;
    let (holder, claimant) = member();
    let seat = h.engine.claim(session_id, claimant).await.unwrap();

    h.set(instant("2025-03-03T17:45:00Z"));
    assert!(
        h.engine
            .cancel(seat.claim_id, Actor::Admin(MemberId::new()))
            .await
            .is_ok()
    );
    assert_eq!(h.credits.balance(holder), 10);
}

#[tokio::test]
async fn test_deadlines_follow_studio_wall_clock() {
    // 18:00 in a UTC+01:00 studio is 17:00 UTC; registration closes 16:00 UTC.
    let studio = StudioTime::from_offset_minutes(60).unwrap();
    let h = Harness::in_studio("2025-03-03T15:59:59Z", studio);
    let session_id = h.schedule(session("2025-03-03", "18:00", 5)).await;

    assert!(h.engine.claim(session_id, member().1).await.is_ok());

    h.set(instant("2025-03-03T16:00:00Z"));
    assert_eq!(
        h.engine.claim(session_id, member().1).await,
        Err(BookingError::Rejected(RejectionReason::RegistrationClosed))
    );
}
