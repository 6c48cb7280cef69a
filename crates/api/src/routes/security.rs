//! Route definitions for `/security`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::security;
use crate::state::AppState;

/// Routes mounted at `/security`.
///
/// ```text
/// GET  /logs               -> list_logs        (security:read)
/// GET  /logs/verify        -> verify_logs      (security:read)
/// GET  /settings           -> get_settings     (security:read)
/// PUT  /settings           -> update_settings  (security:update)
/// POST /settings/manage    -> manage_settings  (security:update)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logs", get(security::list_logs))
        .route("/logs/verify", get(security::verify_logs))
        .route(
            "/settings",
            get(security::get_settings).put(security::update_settings),
        )
        .route("/settings/manage", post(security::manage_settings))
}
