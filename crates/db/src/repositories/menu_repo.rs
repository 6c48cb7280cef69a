//! Repository for the `menus` and `menu_items` tables.

use std::collections::HashMap;

use gatehouse_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::menu::{CreateMenuItem, Menu, MenuItem, MenuWithItems, UpdateMenuItem};

const COLUMNS: &str = "id, name, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, menu_id, label, url, roles, sort_order, created_at, updated_at";

/// Provides CRUD operations for menus and their items.
pub struct MenuRepo;

impl MenuRepo {
    // -----------------------------------------------------------------------
    // Menus
    // -----------------------------------------------------------------------

    /// List all menus with their items, ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<MenuWithItems>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM menus ORDER BY name ASC");
        let menus = sqlx::query_as::<_, Menu>(&query).fetch_all(pool).await?;

        let query = format!("SELECT {ITEM_COLUMNS} FROM menu_items ORDER BY sort_order ASC, id ASC");
        let items = sqlx::query_as::<_, MenuItem>(&query).fetch_all(pool).await?;

        let mut by_menu: HashMap<DbId, Vec<MenuItem>> = HashMap::new();
        for item in items {
            by_menu.entry(item.menu_id).or_default().push(item);
        }

        Ok(menus
            .into_iter()
            .map(|menu| {
                let items = by_menu.remove(&menu.id).unwrap_or_default();
                MenuWithItems { menu, items }
            })
            .collect())
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MenuWithItems>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM menus WHERE id = $1");
        let menu = sqlx::query_as::<_, Menu>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Self::attach_items(pool, menu).await
    }

    pub async fn find_by_name(
        pool: &PgPool,
        name: &str,
    ) -> Result<Option<MenuWithItems>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM menus WHERE name = $1");
        let menu = sqlx::query_as::<_, Menu>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Self::attach_items(pool, menu).await
    }

    async fn attach_items(
        pool: &PgPool,
        menu: Option<Menu>,
    ) -> Result<Option<MenuWithItems>, sqlx::Error> {
        let Some(menu) = menu else {
            return Ok(None);
        };
        let items = Self::list_items(pool, menu.id).await?;
        Ok(Some(MenuWithItems { menu, items }))
    }

    /// Insert a menu and its initial items in one transaction.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        items: &[CreateMenuItem],
    ) -> Result<MenuWithItems, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("INSERT INTO menus (name) VALUES ($1) RETURNING {COLUMNS}");
        let menu = sqlx::query_as::<_, Menu>(&query)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
        let items = insert_items(&mut tx, menu.id, items).await?;

        tx.commit().await?;
        Ok(MenuWithItems { menu, items })
    }

    /// Rename a menu and optionally replace all of its items.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        items: Option<&[CreateMenuItem]>,
    ) -> Result<Option<MenuWithItems>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE menus SET name = COALESCE($2, name) WHERE id = $1 RETURNING {COLUMNS}"
        );
        let Some(menu) = sqlx::query_as::<_, Menu>(&query)
            .bind(id)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(items) = items {
            sqlx::query("DELETE FROM menu_items WHERE menu_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, id, items).await?;
        }

        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE menu_id = $1 \
             ORDER BY sort_order ASC, id ASC"
        );
        let items = sqlx::query_as::<_, MenuItem>(&query)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(MenuWithItems { menu, items }))
    }

    /// Delete a menu. Items cascade.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Copy a menu and all its items under a new name.
    pub async fn duplicate(
        pool: &PgPool,
        source_id: DbId,
        name: &str,
    ) -> Result<Option<MenuWithItems>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let exists: Option<DbId> = sqlx::query_scalar("SELECT id FROM menus WHERE id = $1")
            .bind(source_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let query = format!("INSERT INTO menus (name) VALUES ($1) RETURNING {COLUMNS}");
        let menu = sqlx::query_as::<_, Menu>(&query)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO menu_items (menu_id, label, url, roles, sort_order)
             SELECT $2, label, url, roles, sort_order FROM menu_items WHERE menu_id = $1
             ORDER BY sort_order ASC, id ASC
             RETURNING {ITEM_COLUMNS}"
        );
        let mut items = sqlx::query_as::<_, MenuItem>(&query)
            .bind(source_id)
            .bind(menu.id)
            .fetch_all(&mut *tx)
            .await?;
        items.sort_by_key(|item| (item.sort_order, item.id));

        tx.commit().await?;
        Ok(Some(MenuWithItems { menu, items }))
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub async fn list_items(pool: &PgPool, menu_id: DbId) -> Result<Vec<MenuItem>, sqlx::Error> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE menu_id = $1 \
             ORDER BY sort_order ASC, id ASC"
        );
        sqlx::query_as::<_, MenuItem>(&query)
            .bind(menu_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_item(
        pool: &PgPool,
        menu_id: DbId,
        item_id: DbId,
    ) -> Result<Option<MenuItem>, sqlx::Error> {
        let query =
            format!("SELECT {ITEM_COLUMNS} FROM menu_items WHERE id = $1 AND menu_id = $2");
        sqlx::query_as::<_, MenuItem>(&query)
            .bind(item_id)
            .bind(menu_id)
            .fetch_optional(pool)
            .await
    }

    /// Append an item. Without an explicit order it goes after the last item.
    pub async fn add_item(
        pool: &PgPool,
        menu_id: DbId,
        input: &CreateMenuItem,
    ) -> Result<MenuItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO menu_items (menu_id, label, url, roles, sort_order)
             VALUES ($1, $2, $3, $4, COALESCE($5,
                 (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM menu_items WHERE menu_id = $1)))
             RETURNING {ITEM_COLUMNS}"
        );
        sqlx::query_as::<_, MenuItem>(&query)
            .bind(menu_id)
            .bind(&input.label)
            .bind(&input.url)
            .bind(&input.roles)
            .bind(input.sort_order)
            .fetch_one(pool)
            .await
    }

    pub async fn update_item(
        pool: &PgPool,
        menu_id: DbId,
        item_id: DbId,
        input: &UpdateMenuItem,
    ) -> Result<Option<MenuItem>, sqlx::Error> {
        let query = format!(
            "UPDATE menu_items SET
                label = COALESCE($3, label),
                url = COALESCE($4, url),
                roles = COALESCE($5, roles),
                sort_order = COALESCE($6, sort_order)
             WHERE id = $1 AND menu_id = $2
             RETURNING {ITEM_COLUMNS}"
        );
        sqlx::query_as::<_, MenuItem>(&query)
            .bind(item_id)
            .bind(menu_id)
            .bind(&input.label)
            .bind(&input.url)
            .bind(&input.roles)
            .bind(input.sort_order)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_item(
        pool: &PgPool,
        menu_id: DbId,
        item_id: DbId,
    ) -> Result<Option<MenuItem>, sqlx::Error> {
        let query = format!(
            "DELETE FROM menu_items WHERE id = $1 AND menu_id = $2 RETURNING {ITEM_COLUMNS}"
        );
        sqlx::query_as::<_, MenuItem>(&query)
            .bind(item_id)
            .bind(menu_id)
            .fetch_optional(pool)
            .await
    }

    /// Apply `(item_id, sort_order)` assignments in one transaction.
    pub async fn apply_order(
        pool: &PgPool,
        menu_id: DbId,
        assignments: &[(DbId, i32)],
    ) -> Result<Vec<MenuItem>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        for (item_id, sort_order) in assignments {
            sqlx::query("UPDATE menu_items SET sort_order = $3 WHERE id = $1 AND menu_id = $2")
                .bind(item_id)
                .bind(menu_id)
                .bind(sort_order)
                .execute(&mut *tx)
                .await?;
        }

        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE menu_id = $1 \
             ORDER BY sort_order ASC, id ASC"
        );
        let items = sqlx::query_as::<_, MenuItem>(&query)
            .bind(menu_id)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(items)
    }
}

/// Insert items for a menu. Items without an order take their list index.
async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    menu_id: DbId,
    items: &[CreateMenuItem],
) -> Result<Vec<MenuItem>, sqlx::Error> {
    let query = format!(
        "INSERT INTO menu_items (menu_id, label, url, roles, sort_order)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {ITEM_COLUMNS}"
    );
    let mut created = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let row = sqlx::query_as::<_, MenuItem>(&query)
            .bind(menu_id)
            .bind(&item.label)
            .bind(&item.url)
            .bind(&item.roles)
            .bind(item.sort_order.unwrap_or(idx as i32))
            .fetch_one(&mut **tx)
            .await?;
        created.push(row);
    }
    created.sort_by_key(|item| (item.sort_order, item.id));
    Ok(created)
}
