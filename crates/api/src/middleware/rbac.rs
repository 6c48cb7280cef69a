//! Role-permission authorization extractors.
//!
//! [`Permit`] wraps [`AuthUser`] and rejects requests whose role lacks the
//! required action on the target resource. The requirement is carried in
//! the type, so every protected handler states it in its signature:
//!
//! ```ignore
//! async fn create_page(Permit(user, _): Permit<PagesCreate>) -> AppResult<Json<()>> {
//!     // user's role grants pages:create here
//!     Ok(Json(()))
//! }
//! ```

use std::marker::PhantomData;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gatehouse_core::error::CoreError;
use gatehouse_core::permissions::{Action, Resource};
use gatehouse_core::types::DbId;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// A `(resource, action)` requirement checked by [`Permit`].
pub trait Policy {
    const RESOURCE: Resource;
    const ACTION: Action;
}

macro_rules! policies {
    ($($name:ident => ($resource:ident, $action:ident)),+ $(,)?) => {
        $(
            #[derive(Debug)]
            pub struct $name;

            impl Policy for $name {
                const RESOURCE: Resource = Resource::$resource;
                const ACTION: Action = Action::$action;
            }
        )+
    };
}

policies! {
    UsersCreate => (Users, Create),
    UsersRead => (Users, Read),
    UsersDelete => (Users, Delete),
    PagesCreate => (Pages, Create),
    PagesRead => (Pages, Read),
    PagesUpdate => (Pages, Update),
    PagesDelete => (Pages, Delete),
    MenusCreate => (Menus, Create),
    MenusRead => (Menus, Read),
    MenusUpdate => (Menus, Update),
    MenusDelete => (Menus, Delete),
    SecurityRead => (Security, Read),
    SecurityUpdate => (Security, Update),
}

/// Requires the caller's role to grant `P::ACTION` on `P::RESOURCE`.
/// Rejects with 403 Forbidden otherwise.
pub struct Permit<P: Policy>(pub AuthUser, pub PhantomData<P>);

impl<P: Policy> FromRequestParts<AppState> for Permit<P> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        ensure_permission(&user, P::RESOURCE, P::ACTION)?;
        Ok(Permit(user, PhantomData))
    }
}

/// Reject with 403 unless the caller's role grants `action` on `resource`.
///
/// Bulk endpoints call this per operation, since one batch can mix actions.
pub fn ensure_permission(
    user: &AuthUser,
    resource: Resource,
    action: Action,
) -> Result<(), AppError> {
    if user.permissions.allows(resource, action) {
        return Ok(());
    }
    tracing::warn!(
        user_id = user.user_id,
        role = %user.role,
        %resource,
        %action,
        "Permission denied",
    );
    Err(AppError::Core(CoreError::Forbidden(format!(
        "Access denied: {action} permission required on {resource}"
    ))))
}

/// Requires the `Admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            tracing::warn!(
                user_id = user.user_id,
                role = %user.role,
                "Admin role required",
            );
            return Err(AppError::Core(CoreError::Forbidden(
                "Admin role required".into(),
            )));
        }
        Ok(RequireAdmin(user))
    }
}

/// Allow the request when the caller targets their own record or is an admin.
pub fn ensure_self_or_admin(user: &AuthUser, target_id: DbId) -> Result<(), AppError> {
    if user.user_id == target_id || user.role.is_admin() {
        return Ok(());
    }
    tracing::warn!(
        user_id = user.user_id,
        role = %user.role,
        target_id,
        "Access to another user's record denied",
    );
    Err(AppError::Core(CoreError::Forbidden(
        "You can only access your own account".into(),
    )))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use gatehouse_core::permissions::defaults_for;
    use gatehouse_core::roles::RoleName;

    use super::*;

    fn user(id: DbId, role: RoleName) -> AuthUser {
        AuthUser {
            user_id: id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            role,
            role_id: 1,
            permissions: defaults_for(role),
            ip_address: None,
        }
    }

    #[test]
    fn self_access_is_allowed() {
        assert!(ensure_self_or_admin(&user(5, RoleName::Viewer), 5).is_ok());
    }

    #[test]
    fn admin_may_access_anyone() {
        assert!(ensure_self_or_admin(&user(1, RoleName::Admin), 5).is_ok());
    }

    #[test]
    fn others_are_forbidden() {
        assert_matches!(
            ensure_self_or_admin(&user(2, RoleName::Editor), 5),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
    }

    #[test]
    fn editor_may_update_but_not_delete_pages() {
        let editor = user(3, RoleName::Editor);
        assert!(ensure_permission(&editor, Resource::Pages, Action::Update).is_ok());
        assert_matches!(
            ensure_permission(&editor, Resource::Pages, Action::Delete),
            Err(AppError::Core(CoreError::Forbidden(msg))) if msg.contains("delete")
        );
    }

    #[test]
    fn policy_constants_match_their_names() {
        assert_eq!(PagesCreate::RESOURCE, Resource::Pages);
        assert_eq!(PagesCreate::ACTION, Action::Create);
        assert_eq!(SecurityUpdate::RESOURCE, Resource::Security);
        assert_eq!(SecurityUpdate::ACTION, Action::Update);
    }
}
