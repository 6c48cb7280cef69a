//! Page, page version and draft models.

use gatehouse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `pages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Page {
    pub id: DbId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub is_published: bool,
    pub published_at: Option<Timestamp>,
    pub published_by: Option<DbId>,
    pub unpublished_at: Option<Timestamp>,
    pub unpublished_by: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub sort_order: i32,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `page_versions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PageVersion {
    pub id: DbId,
    pub page_id: DbId,
    pub content: String,
    pub published_at: Timestamp,
    pub published_by: Option<DbId>,
    pub restored_at: Option<Timestamp>,
    pub restored_by: Option<DbId>,
}

/// The single draft slot of a page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PageDraft {
    pub draft_content: Option<String>,
    pub draft_saved_at: Option<Timestamp>,
    pub draft_saved_by: Option<DbId>,
}

/// Minimal projection used to build the page tree and check moves.
#[derive(Debug, Clone, FromRow)]
pub struct PageOutlineRow {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub sort_order: i32,
    pub title: String,
    pub slug: String,
}

/// DTO for inserting a page. The slug is already resolved.
#[derive(Debug, Clone)]
pub struct CreatePage {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub parent_id: Option<DbId>,
    pub sort_order: i32,
    pub created_by: Option<DbId>,
}

/// DTO for updating page content fields. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePage {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub sort_order: Option<i32>,
}
