//! Low-attendance sweep: cancels under-booked sessions once, and only once.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use booking::{Actor, BookingError, CancelOutcome, ClaimStatus, Notification, RejectionReason};
use common::{Harness, guest, instant, member, session};

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 10)).await;
    let (seated, claimant) = member();
    h.engine.claim(session_id, claimant).await.unwrap();

    h.set(instant("2025-03-03T17:01:00Z"));
    let first = h.engine.sweep_low_attendance().await;
    let second = h.engine.sweep_low_attendance().await;
    h.settle().await;

    assert_eq!(first.cancelled, vec![session_id]);
    assert!(second.cancelled.is_empty());
    assert_eq!(second.checked, 0, "called-off sessions drop out of scope");
    assert_eq!(h.notifier.count("CourseCancelledLowAttendance"), 1);
    assert_eq!(h.credits.balance(seated), 10);
    assert_eq!(h.credits.refund_count(), 1);

    let cancelled = h.engine.session(session_id).await.unwrap();
    assert!(cancelled.cancelled_due_to_low_attendance);
    assert!(!cancelled.is_cancelled);
}

#[tokio::test]
async fn test_open_registration_is_left_alone() {
    let h = Harness::at("2025-03-03T16:59:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 10)).await;

    let summary = h.engine.sweep_low_attendance().await;

    assert_eq!(summary.checked, 1);
    assert!(summary.cancelled.is_empty());
    assert!(!h.engine.session(session_id).await.unwrap().is_called_off());
}

#[tokio::test]
async fn test_enough_members_keep_the_class() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 10)).await;
    for _ in 0..3 {
        h.engine.claim(session_id, member().1).await.unwrap();
    }

    h.set(instant("2025-03-03T17:30:00Z"));
    let summary = h.engine.sweep_low_attendance().await;

    assert!(summary.cancelled.is_empty());
    assert_eq!(h.credits.refund_count(), 0);
}

#[tokio::test]
async fn test_guests_do_not_count_toward_the_minimum() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 10)).await;
    for _ in 0..2 {
        h.engine.claim(session_id, member().1).await.unwrap();
    }
    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        h.engine.claim(session_id, guest(email)).await.unwrap();
    }

    h.set(instant("2025-03-03T17:30:00Z"));
    let summary = h.engine.sweep_low_attendance().await;
    h.settle().await;

    assert_eq!(summary.cancelled, vec![session_id]);
    match &h.notifier.sent()[0] {
        Notification::CourseCancelledLowAttendance { participants, .. } => {
            assert_eq!(participants.len(), 5);
        },
        other => panic!("unexpected notification {other:?}"),
    }
}

#[tokio::test]
async fn test_past_sessions_are_out_of_scope() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    h.schedule(session("2025-03-02", "18:00", 10)).await;
    let today = h.schedule(session("2025-03-03", "07:00", 10)).await;

    let summary = h.engine.sweep_low_attendance().await;

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.cancelled, vec![today]);
}

// Class at 18:00 with two seats, registration closing 17:00 and
// cancellation closing 16:00.
#[tokio::test]
async fn test_promotion_then_low_attendance_cancellation() {
    let h = Harness::at("2025-03-03T13:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 2)).await;
    let (user1, claimant1) = member();
    let (user2, claimant2) = member();
    let (user3, claimant3) = member();

    let c1 = h.engine.claim(session_id, claimant1).await.unwrap();
    h.set(instant("2025-03-03T13:10:00Z"));
    let c2 = h.engine.claim(session_id, claimant2).await.unwrap();
    h.set(instant("2025-03-03T13:20:00Z"));
    let c3 = h.engine.claim(session_id, claimant3).await.unwrap();
    assert_eq!(c1.status, ClaimStatus::Registered);
    assert_eq!(c2.status, ClaimStatus::Registered);
    assert_eq!(c3.status, ClaimStatus::Waitlisted);

    h.set(instant("2025-03-03T14:40:00Z"));
    let cancelled = h.engine.cancel(c1.claim_id, Actor::Member(user1)).await.unwrap();
    assert_eq!(
        cancelled,
        CancelOutcome::Cancelled {
            promoted: vec![c3.claim_id]
        }
    );
    assert_eq!(h.engine.occupancy(session_id).await.unwrap().to_string(), "2/2 belegt");

    h.set(instant("2025-03-03T17:04:00Z"));
    assert_eq!(
        h.engine.cancel(c2.claim_id, Actor::Member(user2)).await,
        Err(BookingError::Rejected(RejectionReason::CancellationClosed))
    );

    h.set(instant("2025-03-03T17:05:00Z"));
    let summary = h.engine.sweep_low_attendance().await;
    h.settle().await;

    assert_eq!(summary.cancelled, vec![session_id]);
    for claim_id in [c2.claim_id, c3.claim_id] {
        assert_eq!(
            h.engine.claim_details(claim_id).await.unwrap().status,
            ClaimStatus::Cancelled
        );
    }
    for user in [user1, user2, user3] {
        assert_eq!(h.credits.balance(user), 10, "every credit returned");
    }
    assert_eq!(h.notifier.count("WaitlistPromoted"), 1);
    assert_eq!(h.notifier.count("CourseCancelledLowAttendance"), 1);
}
