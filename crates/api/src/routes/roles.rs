//! Route definitions for `/roles`. Every route requires the Admin role.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::roles;
use crate::state::AppState;

/// Routes mounted at `/roles`.
///
/// ```text
/// GET    /                     -> list_roles
/// POST   /                     -> create_role
/// POST   /manage               -> manage_roles
/// GET    /{id}                 -> get_role
/// PUT    /{id}                 -> update_role
/// DELETE /{id}                 -> delete_role
/// GET    /{id}/users           -> list_members
/// POST   /{id}/users           -> assign_members
/// DELETE /{id}/users           -> remove_members
/// GET    /{id}/permissions     -> get_permissions
/// PUT    /{id}/permissions     -> update_permissions
/// POST   /{id}/duplicate       -> duplicate_role
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(roles::list_roles).post(roles::create_role))
        .route("/manage", post(roles::manage_roles))
        .route(
            "/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .route(
            "/{id}/users",
            get(roles::list_members)
                .post(roles::assign_members)
                .delete(roles::remove_members),
        )
        .route(
            "/{id}/permissions",
            get(roles::get_permissions).put(roles::update_permissions),
        )
        .route("/{id}/duplicate", post(roles::duplicate_role))
}
