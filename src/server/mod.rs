//! HTTP surface: axum router, shared state and error mapping.
mod error;
mod routes;
mod state;

pub use self::error::ApiError;
pub use self::routes::{require_sync_auth, router};
pub use self::state::AppState;
