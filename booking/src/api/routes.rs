//! Router configuration.

use super::health::{health_check, metrics};
use super::state::AppState;
use super::{claims, sessions};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the complete Axum router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Sessions
        .route("/sessions", post(sessions::schedule_session))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/roster", get(sessions::get_roster))
        .route("/sessions/:id/claims", post(sessions::create_claim))
        .route("/sessions/:id/removals", post(sessions::remove_claims))
        .route("/sessions/:id/cancel", post(sessions::cancel_session))
        .route("/sessions/:id/reconcile", post(sessions::reconcile_session))
        // Claims
        .route(
            "/claims/:id",
            get(claims::get_claim).delete(claims::cancel_claim),
        )
        .route(
            "/claims/:id/no-show",
            post(claims::mark_no_show).delete(claims::undo_no_show),
        )
        // Scheduler entry point
        .route("/sweeps/low-attendance", post(sessions::run_sweep));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .with_state(state)
}
