//! Business metrics for the booking engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `booking_claims_total{outcome}` - Claims by outcome (seated, waitlisted, rejected)
//! - `booking_cancellations_total{outcome}` - Cancellations by outcome
//! - `booking_promotions_total` - Waitlist promotions
//! - `booking_no_shows_total{action}` - No-show marks set and cleared
//! - `booking_sweep_cancelled_total` - Sessions cancelled for low attendance
//! - `booking_notifications_total{event_type,result}` - Notification deliveries
//! - `booking_collaborator_failures_total{collaborator}` - Failed ledger, notifier or journal calls
//! - `booking_integrity_violations_total` - Invariant breaches detected at runtime
//!
//! ## Gauges
//! - `booking_sessions` - Sessions held by the engine

use metrics::{describe_counter, describe_gauge};

/// Register all booking metric descriptions.
///
/// Call once at startup, before anything is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "booking_claims_total",
        "Seat claims by outcome (seated, waitlisted, rejected)"
    );
    describe_counter!(
        "booking_cancellations_total",
        "Claim cancellations by outcome (cancelled, already_cancelled, rejected)"
    );
    describe_counter!(
        "booking_promotions_total",
        "Waitlisted claims promoted to a seat"
    );
    describe_counter!(
        "booking_no_shows_total",
        "No-show marks by action (marked, cleared)"
    );
    describe_counter!(
        "booking_sweep_cancelled_total",
        "Sessions cancelled by the low-attendance sweep"
    );
    describe_counter!(
        "booking_notifications_total",
        "Notification deliveries by event type and result"
    );
    describe_counter!(
        "booking_collaborator_failures_total",
        "Failed calls to collaborators (credits, notifier, journal)"
    );
    describe_counter!(
        "booking_integrity_violations_total",
        "Capacity or uniqueness invariants found broken"
    );
    describe_gauge!("booking_sessions", "Sessions held by the engine");

    tracing::info!("Business metrics registered");
}

/// Record a claim outcome.
pub fn record_claim(outcome: &'static str) {
    metrics::counter!("booking_claims_total", "outcome" => outcome).increment(1);
}

/// Record a cancellation outcome.
pub fn record_cancellation(outcome: &'static str) {
    metrics::counter!("booking_cancellations_total", "outcome" => outcome).increment(1);
}

/// Record a waitlist promotion.
pub fn record_promotion() {
    metrics::counter!("booking_promotions_total").increment(1);
}

/// Record a no-show being set or cleared.
pub fn record_no_show(action: &'static str) {
    metrics::counter!("booking_no_shows_total", "action" => action).increment(1);
}

/// Record a low-attendance cancellation.
pub fn record_sweep_cancellation() {
    metrics::counter!("booking_sweep_cancelled_total").increment(1);
}

/// Record a notification delivery result.
pub fn record_notification(event_type: &'static str, result: &'static str) {
    metrics::counter!(
        "booking_notifications_total",
        "event_type" => event_type,
        "result" => result
    )
    .increment(1);
}

/// Record a failed collaborator call.
pub fn record_collaborator_failure(collaborator: &'static str) {
    metrics::counter!("booking_collaborator_failures_total", "collaborator" => collaborator)
        .increment(1);
}

/// Record a broken invariant.
pub fn record_integrity_violation() {
    metrics::counter!("booking_integrity_violations_total").increment(1);
}

/// Record how many sessions the engine holds.
#[allow(clippy::cast_precision_loss)]
pub fn record_sessions(count: usize) {
    metrics::gauge!("booking_sessions").set(count as f64);
}
