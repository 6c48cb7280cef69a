//! Handlers for the `/menus` resource and the items inside each menu.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use gatehouse_core::audit::{AuditAction, AuditResource};
use gatehouse_core::error::CoreError;
use gatehouse_core::menus::{item_visible_to, label_taken, reorder, validate_item_roles};
use gatehouse_core::permissions::{Action, Resource};
use gatehouse_core::types::DbId;
use gatehouse_core::validation::require_text;
use gatehouse_db::models::menu::{CreateMenuItem, MenuItem, MenuWithItems, UpdateMenuItem};
use gatehouse_db::repositories::MenuRepo;
use gatehouse_db::DbPool;
use serde::Deserialize;

use crate::audit;
use crate::error::{AppError, AppResult};
use crate::handlers::bulk::{parse_operation, ManageRequest, ManageResponse, OperationResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{
    ensure_permission, MenusCreate, MenusDelete, MenusRead, MenusUpdate, Permit,
};
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /menus`.
#[derive(Debug, Deserialize)]
pub struct CreateMenuRequest {
    pub name: String,
    #[serde(default)]
    pub items: Vec<CreateMenuItem>,
}

/// Request body for `PUT /menus/{id}`. `items`, when present, replaces
/// every item of the menu.
#[derive(Debug, Deserialize)]
pub struct UpdateMenuRequest {
    pub name: Option<String>,
    pub items: Option<Vec<CreateMenuItem>>,
}

/// Request body for `POST /menus/{id}/duplicate`.
#[derive(Debug, Deserialize)]
pub struct DuplicateMenuRequest {
    pub name: String,
}

/// Request body for `PUT /menus/{id}/reorder`.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub item_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMenuOp {
    pub id: DbId,
    #[serde(flatten)]
    pub changes: UpdateMenuRequest,
}

#[derive(Debug, Deserialize)]
pub struct MenuRef {
    pub id: DbId,
}

#[derive(Debug, Deserialize)]
pub struct AddItemOp {
    pub menu_id: DbId,
    #[serde(flatten)]
    pub item: CreateMenuItem,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemOp {
    pub menu_id: DbId,
    pub item_id: DbId,
    #[serde(flatten)]
    pub changes: UpdateMenuItem,
}

#[derive(Debug, Deserialize)]
pub struct ItemRef {
    pub menu_id: DbId,
    pub item_id: DbId,
}

/// One operation of `POST /menus/manage`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum MenuOperation {
    Create(CreateMenuRequest),
    Update(UpdateMenuOp),
    Delete(MenuRef),
    AddItem(AddItemOp),
    UpdateItem(UpdateItemOp),
    RemoveItem(ItemRef),
}

impl MenuOperation {
    fn action(&self) -> &'static str {
        match self {
            MenuOperation::Create(_) => "create",
            MenuOperation::Update(_) => "update",
            MenuOperation::Delete(_) => "delete",
            MenuOperation::AddItem(_) => "add_item",
            MenuOperation::UpdateItem(_) => "update_item",
            MenuOperation::RemoveItem(_) => "remove_item",
        }
    }

    /// The permission the matching single endpoint demands. Item edits are
    /// menu updates.
    fn required(&self) -> Action {
        match self {
            MenuOperation::Create(_) => Action::Create,
            MenuOperation::Delete(_) => Action::Delete,
            MenuOperation::Update(_)
            | MenuOperation::AddItem(_)
            | MenuOperation::UpdateItem(_)
            | MenuOperation::RemoveItem(_) => Action::Update,
        }
    }
}

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

/// GET /api/v1/menus
pub async fn list_menus(
    State(state): State<AppState>,
    Permit(_user, _): Permit<MenusRead>,
) -> AppResult<Json<DataResponse<Vec<MenuWithItems>>>> {
    let menus = MenuRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: menus }))
}

/// GET /api/v1/menus/visible
///
/// Every menu with only the items the caller's role may see. Requires
/// authentication but no menu permission.
pub async fn visible_menus(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<MenuWithItems>>>> {
    let mut menus = MenuRepo::list(&state.pool).await?;
    for menu in &mut menus {
        menu.items
            .retain(|item| item_visible_to(&item.roles, auth_user.role));
    }
    Ok(Json(DataResponse { data: menus }))
}

/// GET /api/v1/menus/{id}
pub async fn get_menu(
    State(state): State<AppState>,
    Permit(_user, _): Permit<MenusRead>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MenuWithItems>>> {
    let menu = find_menu(&state.pool, id).await?;
    Ok(Json(DataResponse { data: menu }))
}

/// GET /api/v1/menus/name/{name}
pub async fn get_menu_by_name(
    State(state): State<AppState>,
    Permit(_user, _): Permit<MenusRead>,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<MenuWithItems>>> {
    let menu = MenuRepo::find_by_name(&state.pool, &name)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundBy {
                entity: "Menu",
                field: "name",
                value: name.clone(),
            })
        })?;
    Ok(Json(DataResponse { data: menu }))
}

/// POST /api/v1/menus
pub async fn create_menu(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusCreate>,
    Json(input): Json<CreateMenuRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<MenuWithItems>>)> {
    let menu = apply_create(&state.pool, input).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Create,
        AuditResource::Menus,
        format!("Menu {} was created", menu.menu.name),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: menu })))
}

/// PUT /api/v1/menus/{id}
pub async fn update_menu(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusUpdate>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateMenuRequest>,
) -> AppResult<Json<DataResponse<MenuWithItems>>> {
    let menu = apply_update(&state.pool, id, input).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Update,
        AuditResource::Menus,
        format!("Menu {} was updated", menu.menu.name),
    )
    .await;
    Ok(Json(DataResponse { data: menu }))
}

/// DELETE /api/v1/menus/{id}
pub async fn delete_menu(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusDelete>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let menu = apply_delete(&state.pool, id).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Delete,
        AuditResource::Menus,
        format!("Menu {} was deleted", menu.menu.name),
    )
    .await;
    Ok(Json(DataResponse {
        data: MessageResponse::new("Menu deleted successfully"),
    }))
}

/// POST /api/v1/menus/manage
pub async fn manage_menus(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusUpdate>,
    Json(input): Json<ManageRequest>,
) -> AppResult<Json<DataResponse<ManageResponse>>> {
    let operations = input.into_operations()?;
    let count = operations.len();

    let mut results = Vec::with_capacity(count);
    for raw in operations {
        let result = match parse_operation::<MenuOperation>(raw) {
            Ok(op) => {
                let action = op.action();
                match ensure_permission(&auth_user, Resource::Menus, op.required()) {
                    Ok(()) => run_operation(&state.pool, op)
                        .await
                        .unwrap_or_else(|e| OperationResult::failed(action, &e)),
                    Err(e) => OperationResult::failed(action, &e),
                }
            }
            Err(rejected) => rejected,
        };
        results.push(result);
    }

    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Manage,
        AuditResource::Menus,
        format!("Bulk menu operations performed: {count} operations"),
    )
    .await;

    Ok(Json(DataResponse {
        data: ManageResponse::new(results),
    }))
}

/// POST /api/v1/menus/{id}/duplicate
pub async fn duplicate_menu(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusCreate>,
    Path(id): Path<DbId>,
    Json(input): Json<DuplicateMenuRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<MenuWithItems>>)> {
    let name = require_text("name", &input.name)?;
    let source = find_menu(&state.pool, id).await?;
    let menu = MenuRepo::duplicate(&state.pool, id, &name)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Menu", id }))?;

    tracing::info!(source_id = id, menu_id = menu.menu.id, "Menu duplicated");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Duplicate,
        AuditResource::Menus,
        format!("Menu {} was duplicated as {}", source.menu.name, menu.menu.name),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: menu })))
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// POST /api/v1/menus/{id}/items
pub async fn add_item(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusUpdate>,
    Path(id): Path<DbId>,
    Json(input): Json<CreateMenuItem>,
) -> AppResult<(StatusCode, Json<DataResponse<MenuItem>>)> {
    let item = apply_add_item(&state.pool, id, input).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::AddItem,
        AuditResource::Menus,
        format!("Item {} added to menu {id}", item.label),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: item })))
}

/// PUT /api/v1/menus/{id}/items/{item_id}
pub async fn update_item(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusUpdate>,
    Path((id, item_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateMenuItem>,
) -> AppResult<Json<DataResponse<MenuItem>>> {
    let item = apply_update_item(&state.pool, id, item_id, input).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::UpdateItem,
        AuditResource::Menus,
        format!("Item {} updated in menu {id}", item.label),
    )
    .await;
    Ok(Json(DataResponse { data: item }))
}

/// DELETE /api/v1/menus/{id}/items/{item_id}
pub async fn delete_item(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusUpdate>,
    Path((id, item_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let item = apply_remove_item(&state.pool, id, item_id).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::DeleteItem,
        AuditResource::Menus,
        format!("Item {} removed from menu {id}", item.label),
    )
    .await;
    Ok(Json(DataResponse {
        data: MessageResponse::new("Menu item deleted successfully"),
    }))
}

/// PUT /api/v1/menus/{id}/reorder
///
/// Positions follow the order of `item_ids`. Ids that are not items of this
/// menu are ignored; unlisted items keep their order.
pub async fn reorder_items(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<MenusUpdate>,
    Path(id): Path<DbId>,
    Json(input): Json<ReorderRequest>,
) -> AppResult<Json<DataResponse<Vec<MenuItem>>>> {
    let menu = find_menu(&state.pool, id).await?;
    let current: Vec<DbId> = menu.items.iter().map(|item| item.id).collect();
    let assignments = reorder(&current, &input.item_ids);

    let items = MenuRepo::apply_order(&state.pool, id, &assignments).await?;

    tracing::info!(menu_id = id, moved = assignments.len(), "Menu items reordered");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::ReorderItems,
        AuditResource::Menus,
        format!("Items reordered in menu {}", menu.menu.name),
    )
    .await;
    Ok(Json(DataResponse { data: items }))
}

// ---------------------------------------------------------------------------
// Operations shared by single and bulk endpoints
// ---------------------------------------------------------------------------

async fn apply_create(pool: &DbPool, input: CreateMenuRequest) -> AppResult<MenuWithItems> {
    let name = require_text("name", &input.name)?;
    let items = prepare_items(input.items)?;
    let menu = MenuRepo::create(pool, &name, &items).await?;
    tracing::info!(menu_id = menu.menu.id, items = menu.items.len(), "Menu created");
    Ok(menu)
}

async fn apply_update(pool: &DbPool, id: DbId, input: UpdateMenuRequest) -> AppResult<MenuWithItems> {
    let name = input
        .name
        .as_deref()
        .map(|name| require_text("name", name))
        .transpose()?;
    let items = input.items.map(prepare_items).transpose()?;

    let menu = MenuRepo::update(pool, id, name.as_deref(), items.as_deref())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Menu", id }))?;
    tracing::info!(menu_id = id, "Menu updated");
    Ok(menu)
}

async fn apply_delete(pool: &DbPool, id: DbId) -> AppResult<MenuWithItems> {
    let menu = find_menu(pool, id).await?;
    if !MenuRepo::delete(pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Menu", id }));
    }
    tracing::info!(menu_id = id, "Menu deleted");
    Ok(menu)
}

async fn apply_add_item(pool: &DbPool, menu_id: DbId, input: CreateMenuItem) -> AppResult<MenuItem> {
    let menu = find_menu(pool, menu_id).await?;
    let item = prepare_item(input)?;
    ensure_label_free(&menu.items, &item.label, None)?;

    let item = MenuRepo::add_item(pool, menu_id, &item).await?;
    tracing::info!(menu_id, item_id = item.id, "Menu item added");
    Ok(item)
}

async fn apply_update_item(
    pool: &DbPool,
    menu_id: DbId,
    item_id: DbId,
    mut input: UpdateMenuItem,
) -> AppResult<MenuItem> {
    let menu = find_menu(pool, menu_id).await?;
    if !menu.items.iter().any(|item| item.id == item_id) {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Menu item",
            id: item_id,
        }));
    }

    if let Some(label) = input.label.as_deref() {
        let label = require_text("label", label)?;
        ensure_label_free(&menu.items, &label, Some(item_id))?;
        input.label = Some(label);
    }
    if let Some(url) = input.url.as_deref() {
        input.url = Some(require_text("url", url)?);
    }
    if let Some(roles) = input.roles.as_deref() {
        input.roles = Some(validate_item_roles(roles)?);
    }

    let item = MenuRepo::update_item(pool, menu_id, item_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Menu item",
            id: item_id,
        }))?;
    tracing::info!(menu_id, item_id, "Menu item updated");
    Ok(item)
}

async fn apply_remove_item(pool: &DbPool, menu_id: DbId, item_id: DbId) -> AppResult<MenuItem> {
    find_menu(pool, menu_id).await?;
    let item = MenuRepo::delete_item(pool, menu_id, item_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Menu item",
            id: item_id,
        }))?;
    tracing::info!(menu_id, item_id, "Menu item removed");
    Ok(item)
}

async fn run_operation(pool: &DbPool, op: MenuOperation) -> AppResult<OperationResult> {
    Ok(match op {
        MenuOperation::Create(input) => {
            let menu = apply_create(pool, input).await?;
            OperationResult::succeeded("create").with("menu", menu)
        }
        MenuOperation::Update(UpdateMenuOp { id, changes }) => {
            let menu = apply_update(pool, id, changes).await?;
            OperationResult::succeeded("update").with("menu", menu)
        }
        MenuOperation::Delete(MenuRef { id }) => {
            apply_delete(pool, id).await?;
            OperationResult::succeeded("delete").with_message("Menu deleted successfully")
        }
        MenuOperation::AddItem(AddItemOp { menu_id, item }) => {
            let item = apply_add_item(pool, menu_id, item).await?;
            OperationResult::succeeded("add_item").with("item", item)
        }
        MenuOperation::UpdateItem(UpdateItemOp {
            menu_id,
            item_id,
            changes,
        }) => {
            let item = apply_update_item(pool, menu_id, item_id, changes).await?;
            OperationResult::succeeded("update_item").with("item", item)
        }
        MenuOperation::RemoveItem(ItemRef { menu_id, item_id }) => {
            apply_remove_item(pool, menu_id, item_id).await?;
            OperationResult::succeeded("remove_item").with_message("Menu item deleted successfully")
        }
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_menu(pool: &DbPool, id: DbId) -> AppResult<MenuWithItems> {
    MenuRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Menu", id }))
}

/// Trim and check one incoming item; roles are de-duplicated.
fn prepare_item(item: CreateMenuItem) -> AppResult<CreateMenuItem> {
    Ok(CreateMenuItem {
        label: require_text("label", &item.label)?,
        url: require_text("url", &item.url)?,
        roles: validate_item_roles(&item.roles)?,
        sort_order: item.sort_order,
    })
}

/// Check a full item list, rejecting labels repeated within it.
fn prepare_items(items: Vec<CreateMenuItem>) -> AppResult<Vec<CreateMenuItem>> {
    let mut prepared: Vec<CreateMenuItem> = Vec::with_capacity(items.len());
    for item in items {
        let item = prepare_item(item)?;
        if prepared.iter().any(|p| p.label == item.label) {
            return Err(duplicate_label(&item.label));
        }
        prepared.push(item);
    }
    Ok(prepared)
}

fn ensure_label_free(items: &[MenuItem], label: &str, exclude: Option<DbId>) -> AppResult<()> {
    let existing = items.iter().map(|item| (item.id, item.label.as_str()));
    if label_taken(existing, label, exclude) {
        return Err(duplicate_label(label));
    }
    Ok(())
}

fn duplicate_label(label: &str) -> AppError {
    AppError::Core(CoreError::Conflict(format!(
        "A menu item labelled '{label}' already exists in this menu"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn item(label: &str, roles: &[&str]) -> CreateMenuItem {
        CreateMenuItem {
            label: label.to_string(),
            url: format!("/{}", label.to_lowercase()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            sort_order: None,
        }
    }

    #[test]
    fn item_operations_need_menu_update() {
        let op: MenuOperation = serde_json::from_value(serde_json::json!({
            "action": "remove_item",
            "data": { "menu_id": 1, "item_id": 2 }
        }))
        .unwrap();
        assert_eq!(op.required(), Action::Update);

        let op: MenuOperation = serde_json::from_value(serde_json::json!({
            "action": "delete",
            "data": { "id": 1 }
        }))
        .unwrap();
        assert_eq!(op.required(), Action::Delete);
    }

    #[test]
    fn prepare_items_trims_and_dedupes_roles() {
        let mut raw = item("  Home ", &["Admin", "Admin", "Viewer"]);
        raw.url = " / ".to_string();
        let prepared = prepare_items(vec![raw]).unwrap();
        assert_eq!(prepared[0].label, "Home");
        assert_eq!(prepared[0].url, "/");
        assert_eq!(prepared[0].roles, vec!["Admin", "Viewer"]);
    }

    #[test]
    fn prepare_items_rejects_repeated_label() {
        let result = prepare_items(vec![item("Home", &[]), item("Home", &["Admin"])]);
        assert_matches!(result, Err(AppError::Core(CoreError::Conflict(_))));
    }

    #[test]
    fn prepare_items_rejects_unknown_role() {
        let result = prepare_items(vec![item("Home", &["Owner"])]);
        assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
    }

    #[test]
    fn menu_operations_use_snake_case_actions() {
        let op: MenuOperation = serde_json::from_value(serde_json::json!({
            "action": "remove_item",
            "data": { "menu_id": 1, "item_id": 7 }
        }))
        .unwrap();
        assert_matches!(op, MenuOperation::RemoveItem(ItemRef { menu_id: 1, item_id: 7 }));
        assert_eq!(op.action(), "remove_item");
    }
}
