//! Route definitions for `/auth`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /signup                    -> signup                 (public)
/// POST /login                     -> login                  (public)
/// POST /refresh                   -> refresh                (public)
/// POST /verify                    -> verify                 (public)
/// POST /password/reset-request    -> request_password_reset (public)
/// POST /password/reset            -> reset_password         (public)
/// GET  /verify-email/{token}      -> verify_email           (public)
/// POST /logout                    -> logout
/// GET  /me                        -> me
/// POST /password/change           -> change_password
/// PUT  /profile                   -> update_profile
/// POST /verify-email/resend       -> resend_verification
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/verify", post(auth::verify))
        .route("/password/reset-request", post(auth::request_password_reset))
        .route("/password/reset", post(auth::reset_password))
        .route("/verify-email/resend", post(auth::resend_verification))
        .route("/verify-email/{token}", get(auth::verify_email))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password/change", post(auth::change_password))
        .route("/profile", put(auth::update_profile))
}
