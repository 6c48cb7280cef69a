pub mod auth;
pub mod health;
pub mod menus;
pub mod pages;
pub mod roles;
pub mod security;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/...          signup, login, token refresh, session and profile
/// /users/...         user accounts (users:* permissions, self or admin)
/// /roles/...         roles, members and permissions (Admin only)
/// /pages/...         pages, publishing, versions, drafts, hierarchy
/// /menus/...         menus and menu items
/// /security/...      audit trail and security settings
/// ```
///
/// Each module documents its own routes and the permission each needs.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .nest("/pages", pages::router())
        .nest("/menus", menus::router())
        .nest("/security", security::router())
}
