//! Bearer-token authentication extractor for Axum handlers.
//!
//! A token is accepted only when all of these hold:
//!
//! 1. the JWT signature, `exp` and `typ` check out;
//! 2. its SHA-256 digest equals the access-token digest stored on the user;
//! 3. the stored access-token expiry is still in the future.
//!
//! Logout, password change and password reset clear the stored digest, so a
//! token stops working the moment any of those happen.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use chrono::Utc;
use gatehouse_core::error::CoreError;
use gatehouse_core::permissions::PermissionSet;
use gatehouse_core::roles::RoleName;
use gatehouse_core::types::DbId;
use gatehouse_db::repositories::{RoleRepo, UserRepo};

use crate::audit::Actor;
use crate::auth::jwt::validate_access_token;
use crate::auth::tokens::hash_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a Bearer token in the `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id.
    pub user_id: DbId,
    pub username: String,
    pub email: String,
    /// The user's current role (read from the database, not the token).
    pub role: RoleName,
    pub role_id: DbId,
    /// Permissions granted by the role.
    pub permissions: PermissionSet,
    /// Client address, when known.
    pub ip_address: Option<String>,
}

impl AuthUser {
    /// Audit actor for entries written on behalf of this user.
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: Some(self.user_id),
            ip_address: self.ip_address.clone(),
        }
    }
}

fn unauthorized(msg: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(msg.into()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization format. Expected: Bearer <token>"))?;

        authenticate_bearer(state, token, client_ip(parts)).await
    }
}

/// Resolve an access token to its user, applying every acceptance rule.
pub async fn authenticate_bearer(
    state: &AppState,
    token: &str,
    ip_address: Option<String>,
) -> Result<AuthUser, AppError> {
    let claims = validate_access_token(token, &state.config.jwt)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    let user = UserRepo::find_by_id(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| unauthorized("User no longer exists"))?;

    let digest_matches = user.access_token_hash.as_deref() == Some(hash_token(token).as_str());
    let unexpired = user
        .access_token_expires_at
        .is_some_and(|expires_at| expires_at > Utc::now());
    if !digest_matches || !unexpired {
        tracing::debug!(user_id = user.id, "Rejected revoked or superseded access token");
        return Err(unauthorized("Token has been revoked or has expired"));
    }

    let role = RoleRepo::find_by_id(&state.pool, user.role_id)
        .await?
        .ok_or_else(|| AppError::InternalError(format!("User {} references missing role", user.id)))?;
    let role_name = RoleName::parse(&role.name)
        .map_err(|_| AppError::InternalError(format!("Unknown role name '{}'", role.name)))?;

    Ok(AuthUser {
        user_id: user.id,
        username: user.username,
        email: user.email,
        role: role_name,
        role_id: role.id,
        permissions: role.permissions.0,
        ip_address,
    })
}

/// Client address of the request, for audit entries.
///
/// Never rejects; the address is `None` when it cannot be determined.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts)))
    }
}

/// First `X-Forwarded-For` hop, else `X-Real-IP`, else the peer address.
fn client_ip(parts: &Parts) -> Option<String> {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    if let Some(real_ip) = header("x-real-ip") {
        return Some(real_ip.to_string());
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let parts = parts_with(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(client_ip(&parts).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn real_ip_is_used_without_forwarded_for() {
        let parts = parts_with(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(client_ip(&parts).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn peer_address_is_the_last_resort() {
        let mut parts = parts_with(&[]);
        assert_eq!(client_ip(&parts), None);

        let addr: SocketAddr = "192.0.2.7:40000".parse().unwrap();
        parts.extensions.insert(ConnectInfo(addr));
        assert_eq!(client_ip(&parts).as_deref(), Some("192.0.2.7"));
    }
}
