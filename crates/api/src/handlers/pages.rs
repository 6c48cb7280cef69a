//! Handlers for the `/pages` resource: CRUD, publishing, versions, the
//! draft slot and hierarchy moves.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use gatehouse_core::audit::{AuditAction, AuditResource};
use gatehouse_core::error::CoreError;
use gatehouse_core::pages::{build_tree, resolve_slug, would_create_cycle, PageOutline, PageTreeNode};
use gatehouse_core::permissions::{Action, Resource};
use gatehouse_core::types::DbId;
use gatehouse_core::validation::{require_text, validate_slug};
use gatehouse_db::models::page::{CreatePage, Page, PageDraft, PageVersion, UpdatePage};
use gatehouse_db::repositories::PageRepo;
use gatehouse_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::error::{AppError, AppResult};
use crate::handlers::bulk::{parse_operation, ManageRequest, ManageResponse, OperationResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{
    ensure_permission, Permit, PagesCreate, PagesDelete, PagesRead, PagesUpdate,
};
use crate::query::{PageParams, PaginationParams};
use crate::response::{DataResponse, MessageResponse, PagedResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /pages`.
#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    /// Derived from the title when omitted.
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    pub parent_id: Option<DbId>,
    #[serde(default)]
    pub sort_order: i32,
}

/// Request body for `PUT /pages/{id}/draft`.
#[derive(Debug, Deserialize)]
pub struct SaveDraftRequest {
    pub content: String,
}

/// Request body for `POST /pages/{id}/duplicate`.
#[derive(Debug, Deserialize)]
pub struct DuplicatePageRequest {
    /// Defaults to "Copy of <title>".
    pub title: Option<String>,
    /// Derived from the new title when omitted.
    pub slug: Option<String>,
}

/// Request body for `PUT /pages/{id}/move`.
#[derive(Debug, Deserialize)]
pub struct MovePageRequest {
    /// `null` moves the page to the top level.
    pub parent_id: Option<DbId>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Serialize)]
pub struct PageList {
    pub pages: Vec<Page>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePageOp {
    pub id: DbId,
    #[serde(flatten)]
    pub changes: UpdatePage,
}

#[derive(Debug, Deserialize)]
pub struct PageRef {
    pub id: DbId,
}

/// One operation of `POST /pages/manage`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum PageOperation {
    Create(CreatePageRequest),
    Update(UpdatePageOp),
    Delete(PageRef),
    Publish(PageRef),
    Unpublish(PageRef),
}

impl PageOperation {
    fn action(&self) -> &'static str {
        match self {
            PageOperation::Create(_) => "create",
            PageOperation::Update(_) => "update",
            PageOperation::Delete(_) => "delete",
            PageOperation::Publish(_) => "publish",
            PageOperation::Unpublish(_) => "unpublish",
        }
    }

    /// The permission the matching single endpoint demands.
    fn required(&self) -> Action {
        match self {
            PageOperation::Create(_) => Action::Create,
            PageOperation::Delete(_) => Action::Delete,
            PageOperation::Update(_) | PageOperation::Publish(_) | PageOperation::Unpublish(_) => {
                Action::Update
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/pages
///
/// Callers who cannot update pages only see published ones.
pub async fn list_pages(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesRead>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<PageList>>> {
    let published_only = !can_edit(&auth_user);
    let (limit, offset) = params.resolve();
    let pages = PageRepo::list(&state.pool, published_only, limit, offset).await?;
    let total = PageRepo::count(&state.pool, published_only).await?;
    Ok(Json(DataResponse {
        data: PageList { pages, total },
    }))
}

/// GET /api/v1/pages/tree
pub async fn page_tree(
    State(state): State<AppState>,
    Permit(_user, _): Permit<PagesRead>,
) -> AppResult<Json<DataResponse<Vec<PageTreeNode>>>> {
    let rows = PageRepo::list_outlines(&state.pool).await?;
    let outlines = rows
        .into_iter()
        .map(|row| PageOutline {
            id: row.id,
            parent_id: row.parent_id,
            sort_order: row.sort_order,
            title: row.title,
            slug: row.slug,
        })
        .collect();
    Ok(Json(DataResponse {
        data: build_tree(outlines),
    }))
}

/// GET /api/v1/pages/slug/{slug}
pub async fn get_page_by_slug(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesRead>,
    Path(slug): Path<String>,
) -> AppResult<Json<DataResponse<Page>>> {
    let page = PageRepo::find_by_slug(&state.pool, &slug)
        .await?
        .filter(|page| page.is_published || can_edit(&auth_user))
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundBy {
                entity: "Page",
                field: "slug",
                value: slug.clone(),
            })
        })?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/pages/{id}
pub async fn get_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesRead>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Page>>> {
    let page = find_page(&state.pool, id).await?;
    if !page.is_published && !can_edit(&auth_user) {
        return Err(AppError::Core(CoreError::NotFound { entity: "Page", id }));
    }
    Ok(Json(DataResponse { data: page }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// POST /api/v1/pages
pub async fn create_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesCreate>,
    Json(input): Json<CreatePageRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Page>>)> {
    let page = apply_create(&state.pool, auth_user.user_id, input).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Create,
        AuditResource::Pages,
        format!("Page {} was created", page.title),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: page })))
}

/// PUT /api/v1/pages/{id}
///
/// Content edits do not create versions; only publishing does.
pub async fn update_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdatePage>,
) -> AppResult<Json<DataResponse<Page>>> {
    let page = apply_update(&state.pool, id, input).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Update,
        AuditResource::Pages,
        format!("Page {} was updated", page.title),
    )
    .await;
    Ok(Json(DataResponse { data: page }))
}

/// DELETE /api/v1/pages/{id}
///
/// Child pages move to the top level.
pub async fn delete_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesDelete>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let page = apply_delete(&state.pool, id).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Delete,
        AuditResource::Pages,
        format!("Page {} was deleted", page.title),
    )
    .await;
    Ok(Json(DataResponse {
        data: MessageResponse::new("Page deleted successfully"),
    }))
}

/// POST /api/v1/pages/manage
pub async fn manage_pages(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Json(input): Json<ManageRequest>,
) -> AppResult<Json<DataResponse<ManageResponse>>> {
    let operations = input.into_operations()?;
    let count = operations.len();

    let mut results = Vec::with_capacity(count);
    for raw in operations {
        let result = match parse_operation::<PageOperation>(raw) {
            Ok(op) => {
                let action = op.action();
                match ensure_permission(&auth_user, Resource::Pages, op.required()) {
                    Ok(()) => run_operation(&state.pool, auth_user.user_id, op)
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
        AuditResource::Pages,
        format!("Bulk page operations performed: {count} operations"),
    )
    .await;

    Ok(Json(DataResponse {
        data: ManageResponse::new(results),
    }))
}

// ---------------------------------------------------------------------------
// Publishing and versions
// ---------------------------------------------------------------------------

/// POST /api/v1/pages/{id}/publish
///
/// Snapshots the current content as a new version before publishing.
pub async fn publish_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Page>>> {
    let page = apply_publish(&state.pool, id, auth_user.user_id).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Publish,
        AuditResource::Pages,
        format!("Page {} was published", page.title),
    )
    .await;
    Ok(Json(DataResponse { data: page }))
}

/// POST /api/v1/pages/{id}/unpublish
pub async fn unpublish_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Page>>> {
    let page = apply_unpublish(&state.pool, id, auth_user.user_id).await?;
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Unpublish,
        AuditResource::Pages,
        format!("Page {} was unpublished", page.title),
    )
    .await;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/pages/{id}/versions?page=&limit=
pub async fn list_versions(
    State(state): State<AppState>,
    Permit(_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PagedResponse<PageVersion>>> {
    find_page(&state.pool, id).await?;
    let window = params.window();
    let versions = PageRepo::list_versions(&state.pool, id, window.limit, window.offset()).await?;
    let total = PageRepo::count_versions(&state.pool, id).await?;
    Ok(Json(PagedResponse::new(versions, window, total)))
}

/// POST /api/v1/pages/{id}/versions/{version_id}/restore
///
/// The content being replaced is kept as a version of its own.
pub async fn restore_version(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Path((id, version_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<Page>>> {
    find_page(&state.pool, id).await?;
    let page = PageRepo::restore_version(&state.pool, id, version_id, auth_user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Page version",
            id: version_id,
        }))?;

    tracing::info!(page_id = id, version_id, "Page version restored");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::RestoreVersion,
        AuditResource::Pages,
        format!("Page {} was restored to version {version_id}", page.title),
    )
    .await;
    Ok(Json(DataResponse { data: page }))
}

// ---------------------------------------------------------------------------
// Draft slot
// ---------------------------------------------------------------------------

/// GET /api/v1/pages/{id}/draft
pub async fn get_draft(
    State(state): State<AppState>,
    Permit(_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PageDraft>>> {
    let draft = PageRepo::find_draft(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))?;
    Ok(Json(DataResponse { data: draft }))
}

/// PUT /api/v1/pages/{id}/draft
///
/// Overwrites the page's single draft slot.
pub async fn save_draft(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
    Json(input): Json<SaveDraftRequest>,
) -> AppResult<Json<DataResponse<PageDraft>>> {
    let draft = PageRepo::save_draft(&state.pool, id, &input.content, auth_user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))?;

    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::SaveDraft,
        AuditResource::Pages,
        format!("Draft saved for page {id}"),
    )
    .await;
    Ok(Json(DataResponse { data: draft }))
}

/// DELETE /api/v1/pages/{id}/draft
pub async fn delete_draft(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    if !PageRepo::delete_draft(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Page", id }));
    }

    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::DeleteDraft,
        AuditResource::Pages,
        format!("Draft deleted for page {id}"),
    )
    .await;
    Ok(Json(DataResponse {
        data: MessageResponse::new("Draft deleted successfully"),
    }))
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// POST /api/v1/pages/{id}/duplicate
///
/// The copy starts unpublished, with no versions and no draft.
pub async fn duplicate_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesCreate>,
    Path(id): Path<DbId>,
    Json(input): Json<DuplicatePageRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Page>>)> {
    let source = find_page(&state.pool, id).await?;

    let title = match input.title.as_deref() {
        Some(title) => require_text("title", title)?,
        None => format!("Copy of {}", source.title),
    };
    let slug = resolve_slug(input.slug.as_deref(), &title)?;

    let page = PageRepo::duplicate(&state.pool, id, &title, &slug, auth_user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))?;

    tracing::info!(source_id = id, page_id = page.id, "Page duplicated");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Duplicate,
        AuditResource::Pages,
        format!("Page {} was duplicated as {}", source.title, page.title),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: page })))
}

/// PUT /api/v1/pages/{id}/move
///
/// Re-parents a page. Rejects moves that would make the page its own
/// ancestor.
pub async fn move_page(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<PagesUpdate>,
    Path(id): Path<DbId>,
    Json(input): Json<MovePageRequest>,
) -> AppResult<Json<DataResponse<Page>>> {
    let outlines = PageRepo::list_outlines(&state.pool).await?;
    let parents: HashMap<DbId, Option<DbId>> =
        outlines.iter().map(|row| (row.id, row.parent_id)).collect();

    if !parents.contains_key(&id) {
        return Err(AppError::Core(CoreError::NotFound { entity: "Page", id }));
    }
    if let Some(parent_id) = input.parent_id {
        if !parents.contains_key(&parent_id) {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Parent page",
                id: parent_id,
            }));
        }
    }
    if would_create_cycle(id, input.parent_id, &parents) {
        return Err(AppError::BadRequest(
            "A page cannot be moved under itself or one of its descendants".to_string(),
        ));
    }

    let page = PageRepo::move_to(&state.pool, id, input.parent_id, input.sort_order)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))?;

    tracing::info!(page_id = id, parent_id = ?input.parent_id, "Page moved");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Move,
        AuditResource::Pages,
        format!("Page {} was moved", page.title),
    )
    .await;
    Ok(Json(DataResponse { data: page }))
}

// ---------------------------------------------------------------------------
// Operations shared by single and bulk endpoints
// ---------------------------------------------------------------------------

async fn apply_create(pool: &DbPool, user_id: DbId, input: CreatePageRequest) -> AppResult<Page> {
    let title = require_text("title", &input.title)?;
    let slug = resolve_slug(input.slug.as_deref(), &title)?;
    if let Some(parent_id) = input.parent_id {
        find_parent(pool, parent_id).await?;
    }

    let page = PageRepo::create(
        pool,
        &CreatePage {
            title,
            slug,
            content: input.content,
            parent_id: input.parent_id,
            sort_order: input.sort_order,
            created_by: Some(user_id),
        },
    )
    .await?;
    tracing::info!(page_id = page.id, slug = %page.slug, "Page created");
    Ok(page)
}

async fn apply_update(pool: &DbPool, id: DbId, mut input: UpdatePage) -> AppResult<Page> {
    if let Some(title) = input.title.as_deref() {
        input.title = Some(require_text("title", title)?);
    }
    if let Some(slug) = input.slug.as_deref() {
        let slug = slug.trim().to_lowercase();
        validate_slug(&slug)?;
        input.slug = Some(slug);
    }

    let page = PageRepo::update(pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))?;
    tracing::info!(page_id = id, "Page updated");
    Ok(page)
}

async fn apply_delete(pool: &DbPool, id: DbId) -> AppResult<Page> {
    let page = find_page(pool, id).await?;
    if !PageRepo::delete(pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Page", id }));
    }
    tracing::info!(page_id = id, "Page deleted");
    Ok(page)
}

async fn apply_publish(pool: &DbPool, id: DbId, user_id: DbId) -> AppResult<Page> {
    let page = PageRepo::publish(pool, id, user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))?;
    tracing::info!(page_id = id, published_by = user_id, "Page published");
    Ok(page)
}

async fn apply_unpublish(pool: &DbPool, id: DbId, user_id: DbId) -> AppResult<Page> {
    let page = PageRepo::unpublish(pool, id, user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))?;
    tracing::info!(page_id = id, unpublished_by = user_id, "Page unpublished");
    Ok(page)
}

async fn run_operation(
    pool: &DbPool,
    user_id: DbId,
    op: PageOperation,
) -> AppResult<OperationResult> {
    Ok(match op {
        PageOperation::Create(input) => {
            let page = apply_create(pool, user_id, input).await?;
            OperationResult::succeeded("create").with("page", page)
        }
        PageOperation::Update(UpdatePageOp { id, changes }) => {
            let page = apply_update(pool, id, changes).await?;
            OperationResult::succeeded("update").with("page", page)
        }
        PageOperation::Delete(PageRef { id }) => {
            apply_delete(pool, id).await?;
            OperationResult::succeeded("delete").with_message("Page deleted successfully")
        }
        PageOperation::Publish(PageRef { id }) => {
            let page = apply_publish(pool, id, user_id).await?;
            OperationResult::succeeded("publish").with("page", page)
        }
        PageOperation::Unpublish(PageRef { id }) => {
            let page = apply_unpublish(pool, id, user_id).await?;
            OperationResult::succeeded("unpublish").with("page", page)
        }
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn can_edit(user: &AuthUser) -> bool {
    user.permissions.allows(Resource::Pages, Action::Update)
}

async fn find_page(pool: &DbPool, id: DbId) -> AppResult<Page> {
    PageRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Page", id }))
}

async fn find_parent(pool: &DbPool, id: DbId) -> AppResult<Page> {
    PageRepo::find_by_id(pool, id).await?.ok_or(AppError::Core(CoreError::NotFound {
        entity: "Parent page",
        id,
    }))
}

