//! Handlers for the `/roles` resource. Every route requires the Admin role.
//!
//! Role names are the closed set {Admin, Editor, Viewer}. Viewer is the
//! fallback role: members of a deleted role move to it, and it can be
//! neither deleted nor renamed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use gatehouse_core::audit::{AuditAction, AuditResource};
use gatehouse_core::error::CoreError;
use gatehouse_core::permissions::{Permission, PermissionSet};
use gatehouse_core::roles::{RoleName, FALLBACK_ROLE};
use gatehouse_core::types::DbId;
use gatehouse_db::models::role::{CreateRole, Role, UpdateRole};
use gatehouse_db::models::user::UserResponse;
use gatehouse_db::repositories::{RoleRepo, UserRepo};
use gatehouse_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::error::{AppError, AppResult};
use crate::handlers::bulk::{parse_operation, ManageRequest, ManageResponse, OperationResult};
use crate::handlers::users::resolve_role;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for assigning or removing members.
#[derive(Debug, Deserialize)]
pub struct MembersRequest {
    pub user_ids: Vec<DbId>,
}

/// Request body for `PUT /roles/{id}/permissions`.
#[derive(Debug, Deserialize)]
pub struct PermissionsRequest {
    pub permissions: Vec<Permission>,
}

/// Request body for `POST /roles/{id}/duplicate`.
#[derive(Debug, Deserialize)]
pub struct DuplicateRoleRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteRoleResponse {
    pub message: String,
    /// Members moved to the fallback role.
    pub reassigned_users: u64,
}

#[derive(Debug, Serialize)]
pub struct MembersChanged {
    pub role: String,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct RolePermissions {
    pub role: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleOp {
    pub id: DbId,
    #[serde(flatten)]
    pub changes: UpdateRole,
}

#[derive(Debug, Deserialize)]
pub struct RoleRef {
    pub id: DbId,
}

/// One operation of `POST /roles/manage`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum RoleOperation {
    Create(CreateRole),
    Update(UpdateRoleOp),
    Delete(RoleRef),
}

impl RoleOperation {
    fn action(&self) -> &'static str {
        match self {
            RoleOperation::Create(_) => "create",
            RoleOperation::Update(_) => "update",
            RoleOperation::Delete(_) => "delete",
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/roles
pub async fn list_roles(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<Role>>>> {
    let roles = RoleRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: roles }))
}

/// GET /api/v1/roles/{id}
pub async fn get_role(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Role>>> {
    let role = find_role(&state.pool, id).await?;
    Ok(Json(DataResponse { data: role }))
}

/// POST /api/v1/roles
///
/// Recreate a built-in role that was deleted. Existing names are 409.
pub async fn create_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreateRole>,
) -> AppResult<(StatusCode, Json<DataResponse<Role>>)> {
    let role = apply_create(&state.pool, input).await?;
    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::Create,
        AuditResource::Roles,
        format!("Role {} was created", role.name),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: role })))
}

/// PUT /api/v1/roles/{id}
pub async fn update_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRole>,
) -> AppResult<Json<DataResponse<Role>>> {
    let role = apply_update(&state.pool, id, input).await?;
    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::Update,
        AuditResource::Roles,
        format!("Role {} was updated", role.name),
    )
    .await;
    Ok(Json(DataResponse { data: role }))
}

/// DELETE /api/v1/roles/{id}
///
/// Members move to the fallback role in the same transaction.
pub async fn delete_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DeleteRoleResponse>>> {
    let (role, moved) = apply_delete(&state.pool, id).await?;
    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::Delete,
        AuditResource::Roles,
        format!(
            "Role {} was deleted; {moved} users moved to {FALLBACK_ROLE}",
            role.name
        ),
    )
    .await;
    Ok(Json(DataResponse {
        data: DeleteRoleResponse {
            message: "Role deleted successfully".to_string(),
            reassigned_users: moved,
        },
    }))
}

/// POST /api/v1/roles/manage
///
/// Bulk create/update/delete. Each operation reports its own outcome.
pub async fn manage_roles(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ManageRequest>,
) -> AppResult<Json<DataResponse<ManageResponse>>> {
    let operations = input.into_operations()?;
    let count = operations.len();

    let mut results = Vec::with_capacity(count);
    for raw in operations {
        let result = match parse_operation::<RoleOperation>(raw) {
            Ok(op) => {
                let action = op.action();
                run_operation(&state.pool, op)
                    .await
                    .unwrap_or_else(|e| OperationResult::failed(action, &e))
            }
            Err(rejected) => rejected,
        };
        results.push(result);
    }

    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::Manage,
        AuditResource::Roles,
        format!("Bulk role operations performed: {count} operations"),
    )
    .await;

    Ok(Json(DataResponse {
        data: ManageResponse::new(results),
    }))
}

/// GET /api/v1/roles/{id}/users
pub async fn list_members(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    find_role(&state.pool, id).await?;
    let members = UserRepo::list_by_role(&state.pool, id).await?;
    Ok(Json(DataResponse { data: members }))
}

/// POST /api/v1/roles/{id}/users
///
/// Move the listed users into this role.
pub async fn assign_members(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    Json(input): Json<MembersRequest>,
) -> AppResult<Json<DataResponse<MembersChanged>>> {
    let role = find_role(&state.pool, id).await?;
    require_user_ids(&input.user_ids)?;

    let updated = UserRepo::assign_role(&state.pool, &input.user_ids, role.id).await?;

    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::AssignRole,
        AuditResource::Roles,
        format!("Role {} assigned to {updated} users", role.name),
    )
    .await;

    Ok(Json(DataResponse {
        data: MembersChanged {
            role: role.name,
            updated,
        },
    }))
}

/// DELETE /api/v1/roles/{id}/users
///
/// Move the listed members of this role to the fallback role.
pub async fn remove_members(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    Json(input): Json<MembersRequest>,
) -> AppResult<Json<DataResponse<MembersChanged>>> {
    let role = find_role(&state.pool, id).await?;
    require_user_ids(&input.user_ids)?;
    if role.name == FALLBACK_ROLE.as_str() {
        return Err(AppError::BadRequest(format!(
            "Users cannot be removed from the {FALLBACK_ROLE} role"
        )));
    }

    let fallback = resolve_role(&state.pool, FALLBACK_ROLE).await?;
    let updated =
        UserRepo::reassign_members(&state.pool, &input.user_ids, role.id, fallback.id).await?;

    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::RemoveRole,
        AuditResource::Roles,
        format!(
            "Role {} removed from {updated} users; moved to {FALLBACK_ROLE}",
            role.name
        ),
    )
    .await;

    Ok(Json(DataResponse {
        data: MembersChanged {
            role: role.name,
            updated,
        },
    }))
}

/// GET /api/v1/roles/{id}/permissions
pub async fn get_permissions(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RolePermissions>>> {
    let role = find_role(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: RolePermissions {
            role: role.name,
            permissions: role.permissions.0,
        },
    }))
}

/// PUT /api/v1/roles/{id}/permissions
///
/// Replace the role's permission list. Takes effect on the members' next
/// request.
pub async fn update_permissions(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    Json(input): Json<PermissionsRequest>,
) -> AppResult<Json<DataResponse<RolePermissions>>> {
    let permissions = PermissionSet::new(input.permissions);
    let role = RoleRepo::update(&state.pool, id, None, Some(&permissions))
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Role", id }))?;

    tracing::info!(role_id = id, role = %role.name, "Role permissions replaced");
    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::UpdatePermissions,
        AuditResource::Roles,
        format!("Permissions updated for role {}", role.name),
    )
    .await;

    Ok(Json(DataResponse {
        data: RolePermissions {
            role: role.name,
            permissions: role.permissions.0,
        },
    }))
}

/// POST /api/v1/roles/{id}/duplicate
///
/// Create the named role with a copy of this role's permissions.
pub async fn duplicate_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    Json(input): Json<DuplicateRoleRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Role>>)> {
    let source = find_role(&state.pool, id).await?;
    let name = RoleName::parse(&input.name)?;
    let role = RoleRepo::create(&state.pool, name.as_str(), source.permission_set()).await?;

    audit::record(
        &state.pool,
        &admin.actor(),
        AuditAction::Duplicate,
        AuditResource::Roles,
        format!("Role {} duplicated as {}", source.name, role.name),
    )
    .await;

    Ok((StatusCode::CREATED, Json(DataResponse { data: role })))
}

// ---------------------------------------------------------------------------
// Operations shared by single and bulk endpoints
// ---------------------------------------------------------------------------

async fn apply_create(pool: &DbPool, input: CreateRole) -> AppResult<Role> {
    let name = RoleName::parse(&input.name)?;
    let permissions = PermissionSet::new(input.permissions);
    let role = RoleRepo::create(pool, name.as_str(), &permissions).await?;
    tracing::info!(role_id = role.id, role = %role.name, "Role created");
    Ok(role)
}

async fn apply_update(pool: &DbPool, id: DbId, input: UpdateRole) -> AppResult<Role> {
    let current = find_role(pool, id).await?;

    let name = match input.name.as_deref() {
        Some(raw) => {
            let name = RoleName::parse(raw)?;
            if name.as_str() != current.name {
                ensure_renamable(&current.name)?;
            }
            Some(name)
        }
        None => None,
    };
    let permissions = input.permissions.map(PermissionSet::new);

    let role = RoleRepo::update(pool, id, name.map(RoleName::as_str), permissions.as_ref())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Role", id }))?;
    tracing::info!(role_id = id, role = %role.name, "Role updated");
    Ok(role)
}

async fn apply_delete(pool: &DbPool, id: DbId) -> AppResult<(Role, u64)> {
    let role = find_role(pool, id).await?;
    match RoleName::parse(&role.name) {
        Ok(RoleName::Viewer) => {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "The {FALLBACK_ROLE} role is the fallback role and cannot be deleted"
            ))));
        }
        Ok(RoleName::Admin) => {
            return Err(AppError::Core(CoreError::Conflict(
                "The Admin role cannot be deleted".into(),
            )));
        }
        _ => {}
    }

    let fallback = resolve_role(pool, FALLBACK_ROLE).await?;
    let moved = RoleRepo::delete_with_fallback(pool, id, fallback.id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Role", id }))?;

    tracing::info!(role_id = id, role = %role.name, moved, "Role deleted");
    Ok((role, moved))
}

async fn run_operation(pool: &DbPool, op: RoleOperation) -> AppResult<OperationResult> {
    Ok(match op {
        RoleOperation::Create(input) => {
            let role = apply_create(pool, input).await?;
            OperationResult::succeeded("create").with("role", role)
        }
        RoleOperation::Update(UpdateRoleOp { id, changes }) => {
            let role = apply_update(pool, id, changes).await?;
            OperationResult::succeeded("update").with("role", role)
        }
        RoleOperation::Delete(RoleRef { id }) => {
            let (_, moved) = apply_delete(pool, id).await?;
            OperationResult::succeeded("delete")
                .with_message(format!("Role deleted; {moved} users moved to {FALLBACK_ROLE}"))
        }
    })
}

/// Viewer and Admin keep their names: members of deleted roles fall back to
/// Viewer, and every admin gate matches the Admin name.
fn ensure_renamable(current: &str) -> AppResult<()> {
    match RoleName::parse(current) {
        Ok(role @ (RoleName::Viewer | RoleName::Admin)) => Err(AppError::Core(
            CoreError::Conflict(format!("The {role} role cannot be renamed")),
        )),
        _ => Ok(()),
    }
}

async fn find_role(pool: &DbPool, id: DbId) -> AppResult<Role> {
    RoleRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Role", id }))
}

fn require_user_ids(user_ids: &[DbId]) -> AppResult<()> {
    if user_ids.is_empty() {
        return Err(AppError::BadRequest("user_ids must not be empty".to_string()));
    }
    Ok(())
}

