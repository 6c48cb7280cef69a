//! Handlers for the `/users` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use gatehouse_core::audit::{AuditAction, AuditResource};
use gatehouse_core::error::CoreError;
use gatehouse_core::roles::{RoleName, FALLBACK_ROLE};
use gatehouse_core::types::DbId;
use gatehouse_core::validation::{normalize_email, validate_username};
use gatehouse_db::models::role::Role;
use gatehouse_db::models::user::{CreateUser, UpdateUser, UserResponse};
use gatehouse_db::repositories::{RoleRepo, UserRepo};
use gatehouse_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::error::{AppError, AppResult};
use crate::handlers::hash_new_password;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{
    ensure_self_or_admin, Permit, UsersCreate, UsersDelete, UsersRead,
};
use crate::query::PaginationParams;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Role name; defaults to Viewer.
    pub role: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

/// Request body for `PUT /users/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Role name. Only admins may change roles.
    pub role: Option<String>,
    /// Only admins may change verification state.
    pub is_verified: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserResponse>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    Permit(_user, _): Permit<UsersRead>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<UserList>>> {
    let (limit, offset) = params.resolve();
    let users = UserRepo::list(&state.pool, limit, offset).await?;
    let total = UserRepo::count(&state.pool).await?;
    Ok(Json(DataResponse {
        data: UserList { users, total },
    }))
}

/// GET /api/v1/users/{id}
///
/// Users may read their own record; admins may read any.
pub async fn get_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    ensure_self_or_admin(&auth_user, id)?;
    let user = find_response(&state.pool, id).await?;
    Ok(Json(DataResponse { data: user }))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<UsersCreate>,
    Json(input): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let username = validate_username(&input.username)?;
    let email = normalize_email(&input.email)?;
    let role_name = match input.role.as_deref() {
        Some(name) => RoleName::parse(name)?,
        None => FALLBACK_ROLE,
    };
    let role = resolve_role(&state.pool, role_name).await?;
    let password_hash = hash_new_password(&state.pool, &input.password).await?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username,
            email,
            password_hash,
            role_id: role.id,
            is_verified: input.is_verified,
        },
    )
    .await?;

    tracing::info!(
        user_id = user.id,
        role = %role.name,
        created_by = auth_user.user_id,
        "User created",
    );
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Create,
        AuditResource::Users,
        format!("User {} was created", user.username),
    )
    .await;

    let response = find_response(&state.pool, user.id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// PUT /api/v1/users/{id}
///
/// Users may update their own username and email; admins may update anyone
/// and are the only ones who may change `role` or `is_verified`.
pub async fn update_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    ensure_self_or_admin(&auth_user, id)?;

    if (input.role.is_some() || input.is_verified.is_some()) && !auth_user.role.is_admin() {
        tracing::warn!(
            user_id = auth_user.user_id,
            target_id = id,
            "Non-admin attempted to change role or verification",
        );
        return Err(AppError::Core(CoreError::Forbidden(
            "Only admins can change roles or verification status".into(),
        )));
    }

    let role_id = match input.role.as_deref() {
        Some(name) => Some(resolve_role(&state.pool, RoleName::parse(name)?).await?.id),
        None => None,
    };

    let changes = UpdateUser {
        username: input.username.as_deref().map(validate_username).transpose()?,
        email: input.email.as_deref().map(normalize_email).transpose()?,
        role_id,
        is_verified: input.is_verified,
    };

    let user = UserRepo::update(&state.pool, id, &changes)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;

    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Update,
        AuditResource::Users,
        format!("User {} was updated", user.username),
    )
    .await;

    let response = find_response(&state.pool, id).await?;
    Ok(Json(DataResponse { data: response }))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<UsersDelete>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    if id == auth_user.user_id {
        return Err(AppError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    let user = UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;

    if !UserRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "User", id }));
    }

    tracing::info!(user_id = id, deleted_by = auth_user.user_id, "User deleted");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Delete,
        AuditResource::Users,
        format!("User {} was deleted", user.username),
    )
    .await;

    Ok(Json(DataResponse {
        data: MessageResponse::new("User deleted successfully"),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_response(pool: &DbPool, id: DbId) -> AppResult<UserResponse> {
    UserRepo::find_response(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
}

/// Look up the row of a built-in role. A missing row means the role was
/// deleted and cannot be assigned.
pub(crate) async fn resolve_role(pool: &DbPool, name: RoleName) -> AppResult<Role> {
    RoleRepo::find_by_name(pool, name.as_str())
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundBy {
                entity: "Role",
                field: "name",
                value: name.to_string(),
            })
        })
}
