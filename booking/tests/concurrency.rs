//! Concurrent claims against one session never overbook it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use booking::{BookingError, ClaimStatus};
use common::{Harness, guest, member, session};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fifty_simultaneous_claims_fill_exactly_the_capacity() {
    let h = Arc::new(Harness::at("2025-03-03T08:00:00Z"));
    let session_id = h.schedule(session("2025-03-03", "18:00", 7)).await;

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let engine = Arc::clone(&h.engine);
            let claimant = if i % 2 == 0 {
                member().1
            } else {
                guest(&format!("guest{i}@example.com"))
            };
            tokio::spawn(async move { engine.claim(session_id, claimant).await })
        })
        .collect();

    let mut registered = 0;
    let mut waitlisted = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap().status {
            ClaimStatus::Registered => registered += 1,
            ClaimStatus::Waitlisted => waitlisted += 1,
            ClaimStatus::Cancelled => unreachable!("fresh claims are never cancelled"),
        }
    }

    assert_eq!(registered, 7);
    assert_eq!(waitlisted, 43);

    let occupancy = h.engine.occupancy(session_id).await.unwrap();
    assert_eq!((occupancy.registered, occupancy.waitlisted), (7, 43));

    let positions: Vec<usize> = h
        .engine
        .roster(session_id)
        .await
        .unwrap()
        .waitlist
        .iter()
        .map(|entry| entry.position)
        .collect();
    assert_eq!(positions, (1..=43).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_duplicate_claims_admit_one() {
    let h = Arc::new(Harness::at("2025-03-03T08:00:00Z"));
    let session_id = h.schedule(session("2025-03-03", "18:00", 10)).await;
    let (member_id, claimant) = member();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&h.engine);
            let claimant = claimant.clone();
            tokio::spawn(async move { engine.claim(session_id, claimant).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(error) => assert_eq!(
                error,
                BookingError::Rejected(booking::RejectionReason::DuplicateClaim)
            ),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(h.credits.balance(member_id), 9, "charged once");
}
