//! Administrative surface, excluded from forwarding.
//!
//! Guarded by path convention only; there is no authentication on these
//! endpoints in the deployed design.

pub mod handlers;

use axum::routing::get;
use axum::Router;

use self::handlers::{get_config, get_health, put_config};
use crate::http::server::AppState;

/// Paths reserved for the gateway itself. Registered as exact routes ahead
/// of the wildcard forward route, so they never reach the upstream transport
/// even when the backend serves byte-identical paths.
pub const RESERVED_PATHS: &[&str] = &["/health", "/config"];

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(get_health))
        .route("/config", get(get_config).put(put_config))
}
