//! Handlers for the `/auth` resource: sessions, passwords and email
//! verification.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use gatehouse_core::audit::{AuditAction, AuditResource};
use gatehouse_core::error::CoreError;
use gatehouse_core::permissions::PermissionSet;
use gatehouse_core::roles::SIGNUP_ROLE;
use gatehouse_core::types::DbId;
use gatehouse_core::validation::{normalize_email, validate_username};
use gatehouse_db::models::user::{CreateUser, SessionTokens, UpdateUser, User, UserResponse};
use gatehouse_db::repositories::{RoleRepo, UserRepo};
use serde::{Deserialize, Serialize};

use crate::audit::{self, Actor};
use crate::auth::jwt::{
    generate_access_token, generate_refresh_token, validate_refresh_token, IssuedToken,
};
use crate::auth::password::verify_password;
use crate::auth::tokens::{
    generate_opaque_token, hash_token, RESET_TOKEN_TTL, VERIFICATION_TOKEN_TTL,
};
use crate::error::{AppError, AppResult};
use crate::handlers::hash_new_password;
use crate::middleware::auth::{authenticate_bearer, AuthUser, ClientIp};
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

/// Returned by password-reset requests whether or not the account exists.
const RESET_REQUEST_MESSAGE: &str =
    "If an account exists with this email, a password reset link will be sent";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for `POST /auth/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// Request body for `POST /auth/password/reset-request`.
#[derive(Debug, Deserialize)]
pub struct ResetRequestRequest {
    pub email: String,
}

/// Request body for `POST /auth/password/reset`.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Request body for `POST /auth/password/change`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Request body for `PUT /auth/profile`.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Successful authentication response returned by signup, login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Response for `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub permissions: PermissionSet,
}

/// Response for `POST /auth/verify`.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/signup
///
/// Register a new account with the Viewer role and start a session.
pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(input): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<AuthResponse>>)> {
    let username = validate_username(&input.username)?;
    let email = normalize_email(&input.email)?;
    let password_hash = hash_new_password(&state.pool, &input.password).await?;

    let role = RoleRepo::find_by_name(&state.pool, SIGNUP_ROLE.as_str())
        .await?
        .ok_or_else(|| {
            AppError::InternalError(format!("Role setup error: {SIGNUP_ROLE} role missing"))
        })?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username,
            email,
            password_hash,
            role_id: role.id,
            is_verified: false,
        },
    )
    .await?;

    issue_verification_token(&state, user.id).await?;
    let response = start_session(&state, &user, &role.name).await?;

    tracing::info!(user_id = user.id, username = %user.username, "User signed up");
    audit::record(
        &state.pool,
        &Actor::new(user.id, ip),
        AuditAction::Signup,
        AuditResource::Auth,
        format!("User {} registered", user.username),
    )
    .await;

    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns access and refresh tokens and
/// replaces any previously stored pair.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid credentials".into()));

    let email = input.email.trim().to_lowercase();
    let user = UserRepo::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| {
            tracing::warn!(email = %email, "Login failed: unknown email");
            invalid()
        })?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::warn!(user_id = user.id, "Login failed: wrong password");
        return Err(invalid());
    }

    UserRepo::record_login(&state.pool, user.id).await?;
    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    let response = start_session(&state, &user, &role_name).await?;

    tracing::info!(user_id = user.id, role = %role_name, "User logged in");
    audit::record(
        &state.pool,
        &Actor::new(user.id, ip),
        AuditAction::Login,
        AuditResource::Auth,
        format!("User {} logged in", user.username),
    )
    .await;

    Ok(Json(DataResponse { data: response }))
}

/// POST /api/v1/auth/refresh
///
/// Exchange the current refresh token for a new access + refresh pair. The
/// presented refresh token stops working; replaying it yields 401.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let rejected =
        || AppError::Core(CoreError::Unauthorized("Refresh token expired or invalid".into()));

    let claims = validate_refresh_token(&input.refresh_token, &state.config.jwt)
        .map_err(|_| rejected())?;

    let user = UserRepo::find_by_id(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User not found".into())))?;

    let presented_hash = hash_token(&input.refresh_token);
    let stored_matches = user.refresh_token_hash.as_deref() == Some(presented_hash.as_str());
    let unexpired = user
        .refresh_token_expires_at
        .is_some_and(|expires_at| expires_at > Utc::now());
    if !stored_matches || !unexpired {
        tracing::warn!(user_id = user.id, "Refresh rejected: token superseded or expired");
        return Err(rejected());
    }

    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    let (access, refresh) = sign_pair(&state, user.id, &role_name)?;

    let rotated = UserRepo::rotate_session_tokens(
        &state.pool,
        user.id,
        &presented_hash,
        &session_tokens(&access, &refresh),
    )
    .await?;
    if !rotated {
        tracing::warn!(user_id = user.id, "Refresh rejected: lost rotation race");
        return Err(rejected());
    }

    tracing::debug!(user_id = user.id, "Session tokens rotated");
    let response = auth_response(&state, user.id, access, refresh).await?;
    Ok(Json(DataResponse { data: response }))
}

/// POST /api/v1/auth/logout
///
/// Clear the stored token pair, revoking every outstanding token at once.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    UserRepo::clear_session_tokens(&state.pool, auth_user.user_id).await?;

    tracing::info!(user_id = auth_user.user_id, "User logged out");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Logout,
        AuditResource::Auth,
        format!("User {} logged out", auth_user.username),
    )
    .await;

    Ok(Json(DataResponse {
        data: MessageResponse::new("Logged out successfully"),
    }))
}

/// POST /api/v1/auth/verify
///
/// Check an access token passed in the body, with the same rules the
/// `Authorization` header is held to.
pub async fn verify(
    State(state): State<AppState>,
    Json(input): Json<VerifyRequest>,
) -> AppResult<Json<DataResponse<VerifyResponse>>> {
    let auth_user = authenticate_bearer(&state, &input.token, None).await?;
    let user = load_user_response(&state, auth_user.user_id).await?;
    Ok(Json(DataResponse {
        data: VerifyResponse { valid: true, user },
    }))
}

/// GET /api/v1/auth/me
///
/// The caller's account and the permissions their role grants.
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let user = load_user_response(&state, auth_user.user_id).await?;
    Ok(Json(DataResponse {
        data: MeResponse {
            user,
            permissions: auth_user.permissions,
        },
    }))
}

/// POST /api/v1/auth/password/reset-request
///
/// Issue a one-hour reset token. The response is identical whether or not
/// the email is registered.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(input): Json<ResetRequestRequest>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let email = input.email.trim().to_lowercase();

    if let Some(user) = UserRepo::find_by_email(&state.pool, &email).await? {
        // TODO: email the plaintext token once a mail transport is configured.
        let (_, digest) = generate_opaque_token();
        UserRepo::set_reset_token(&state.pool, user.id, &digest, Utc::now() + RESET_TOKEN_TTL)
            .await?;
        tracing::debug!(user_id = user.id, "Password reset token issued");
        audit::record(
            &state.pool,
            &Actor::new(user.id, ip),
            AuditAction::RequestPasswordReset,
            AuditResource::Auth,
            format!("Password reset requested for {email}"),
        )
        .await;
    } else {
        tracing::debug!(email = %email, "Password reset requested for unknown email");
    }

    Ok(Json(DataResponse {
        data: MessageResponse::new(RESET_REQUEST_MESSAGE),
    }))
}

/// POST /api/v1/auth/password/reset
///
/// Set a new password using a reset token. Consumes the token and revokes
/// every session.
pub async fn reset_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let user = UserRepo::find_by_reset_token(&state.pool, &hash_token(&input.token))
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

    let password_hash = hash_new_password(&state.pool, &input.password).await?;
    UserRepo::update_password(&state.pool, user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "Password reset completed");
    audit::record(
        &state.pool,
        &Actor::new(user.id, ip),
        AuditAction::ResetPassword,
        AuditResource::Auth,
        format!("Password reset completed for {}", user.email),
    )
    .await;

    Ok(Json(DataResponse {
        data: MessageResponse::new("Password has been reset successfully"),
    }))
}

/// POST /api/v1/auth/password/change
///
/// Change the caller's password. Every session, including the current one,
/// is revoked; the client must log in again.
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let user = find_user(&state, auth_user.user_id).await?;

    let current_valid = verify_password(&input.current_password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !current_valid {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Current password is incorrect".into(),
        )));
    }

    let password_hash = hash_new_password(&state.pool, &input.new_password).await?;
    UserRepo::update_password(&state.pool, user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "Password changed");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::ChangePassword,
        AuditResource::Auth,
        format!("Password changed for {}", user.email),
    )
    .await;

    Ok(Json(DataResponse {
        data: MessageResponse::new("Password changed successfully. Please log in again"),
    }))
}

/// PUT /api/v1/auth/profile
///
/// Change the caller's username and/or email. A new email must be verified
/// again.
pub async fn update_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<UpdateProfileRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = find_user(&state, auth_user.user_id).await?;

    let username = input
        .username
        .as_deref()
        .map(validate_username)
        .transpose()?
        .filter(|name| *name != user.username);
    let email = input
        .email
        .as_deref()
        .map(normalize_email)
        .transpose()?
        .filter(|email| *email != user.email);
    let email_changed = email.is_some();

    let changes = UpdateUser {
        username,
        email,
        is_verified: email_changed.then_some(false),
        ..Default::default()
    };
    UserRepo::update(&state.pool, user.id, &changes)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user.id,
        }))?;

    if email_changed {
        issue_verification_token(&state, user.id).await?;
    }

    let updated = load_user_response(&state, user.id).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::UpdateProfile,
        AuditResource::Auth,
        format!("Profile updated for {}", updated.email),
    )
    .await;

    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/v1/auth/verify-email/resend
///
/// Replace the caller's verification token with a fresh 24-hour one.
pub async fn resend_verification(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let user = find_user(&state, auth_user.user_id).await?;
    if user.is_verified {
        return Err(AppError::BadRequest("Email is already verified".to_string()));
    }

    issue_verification_token(&state, user.id).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::ResendVerification,
        AuditResource::Auth,
        format!("Verification email resent to {}", user.email),
    )
    .await;

    Ok(Json(DataResponse {
        data: MessageResponse::new("Verification email has been resent"),
    }))
}

/// GET /api/v1/auth/verify-email/{token}
///
/// Mark the token holder's email verified and consume the token.
pub async fn verify_email(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(token): Path<String>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let user = UserRepo::find_by_verification_token(&state.pool, &hash_token(&token))
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("Invalid or expired verification token".to_string())
        })?;

    UserRepo::mark_verified(&state.pool, user.id).await?;

    tracing::info!(user_id = user.id, "Email verified");
    audit::record(
        &state.pool,
        &Actor::new(user.id, ip),
        AuditAction::VerifyEmail,
        AuditResource::Auth,
        format!("Email verified for {}", user.email),
    )
    .await;

    Ok(Json(DataResponse {
        data: MessageResponse::new("Email verified successfully"),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_user(state: &AppState, id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
}

async fn load_user_response(state: &AppState, id: DbId) -> AppResult<UserResponse> {
    UserRepo::find_response(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
}

/// Sign a fresh access + refresh pair.
fn sign_pair(
    state: &AppState,
    user_id: DbId,
    role: &str,
) -> AppResult<(IssuedToken, IssuedToken)> {
    let access = generate_access_token(user_id, role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    let refresh = generate_refresh_token(user_id, role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    Ok((access, refresh))
}

/// Digests and expiries to persist for a signed pair.
fn session_tokens(access: &IssuedToken, refresh: &IssuedToken) -> SessionTokens {
    SessionTokens {
        access_token_hash: hash_token(&access.token),
        access_token_expires_at: access.expires_at,
        refresh_token_hash: hash_token(&refresh.token),
        refresh_token_expires_at: refresh.expires_at,
    }
}

/// Sign a pair, store its digests on the user and build the response.
async fn start_session(state: &AppState, user: &User, role: &str) -> AppResult<AuthResponse> {
    let (access, refresh) = sign_pair(state, user.id, role)?;
    UserRepo::store_session_tokens(&state.pool, user.id, &session_tokens(&access, &refresh))
        .await?;
    auth_response(state, user.id, access, refresh).await
}

async fn auth_response(
    state: &AppState,
    user_id: DbId,
    access: IssuedToken,
    refresh: IssuedToken,
) -> AppResult<AuthResponse> {
    let user = load_user_response(state, user_id).await?;
    Ok(AuthResponse {
        access_token: access.token,
        refresh_token: refresh.token,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user,
    })
}

/// Replace the user's verification token. Only the digest is kept.
async fn issue_verification_token(state: &AppState, user_id: DbId) -> AppResult<()> {
    let (_, digest) = generate_opaque_token();
    UserRepo::set_verification_token(
        &state.pool,
        user_id,
        &digest,
        Utc::now() + VERIFICATION_TOKEN_TTL,
    )
    .await?;
    tracing::debug!(user_id, "Verification token issued");
    Ok(())
}
