//! HTTP surface.
//!
//! Thin JSON API over [`Engine`](crate::engine::Engine). Identity arrives in
//! headers set by the upstream identity service; see [`identity`].

pub mod claims;
pub mod error;
pub mod health;
pub mod identity;
pub mod routes;
pub mod sessions;
pub mod state;

pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;
