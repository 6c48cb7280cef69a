//! Menu and menu item models.

use gatehouse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `menus` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Menu {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `menu_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MenuItem {
    pub id: DbId,
    pub menu_id: DbId,
    pub label: String,
    pub url: String,
    pub roles: Vec<String>,
    pub sort_order: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A menu together with its items in display order.
#[derive(Debug, Clone, Serialize)]
pub struct MenuWithItems {
    #[serde(flatten)]
    pub menu: Menu,
    pub items: Vec<MenuItem>,
}

/// DTO for inserting a menu item. Roles are already validated.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMenuItem {
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// DTO for updating a menu item. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMenuItem {
    pub label: Option<String>,
    pub url: Option<String>,
    pub roles: Option<Vec<String>>,
    pub sort_order: Option<i32>,
}
