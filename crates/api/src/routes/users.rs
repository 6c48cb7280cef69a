//! Route definitions for `/users`.

use axum::routing::get;
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// GET    /        -> list_users   (users:read)
/// POST   /        -> create_user  (users:create)
/// GET    /{id}    -> get_user     (self or admin)
/// PUT    /{id}    -> update_user  (self or admin)
/// DELETE /{id}    -> delete_user  (users:delete)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
}
