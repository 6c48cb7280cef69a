//! Repository for the `pages` and `page_versions` tables.

use gatehouse_core::types::DbId;
use sqlx::PgPool;

use crate::models::page::{
    CreatePage, Page, PageDraft, PageOutlineRow, PageVersion, UpdatePage,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const COLUMNS: &str = "id, title, slug, content, is_published, published_at, published_by, \
                       unpublished_at, unpublished_by, parent_id, sort_order, created_by, \
                       created_at, updated_at";

const VERSION_COLUMNS: &str =
    "id, page_id, content, published_at, published_by, restored_at, restored_by";

/// Provides CRUD, publishing and versioning operations for pages.
pub struct PageRepo;

impl PageRepo {
    /// Insert a new page, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreatePage) -> Result<Page, sqlx::Error> {
        let query = format!(
            "INSERT INTO pages (title, slug, content, parent_id, sort_order, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.content)
            .bind(input.parent_id)
            .bind(input.sort_order)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE slug = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// List pages in tree order, optionally only published ones.
    pub async fn list(
        pool: &PgPool,
        published_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Page>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pages \
             WHERE ($1 = FALSE OR is_published = TRUE) \
             ORDER BY sort_order ASC, id ASC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(published_only)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool, published_only: bool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM pages WHERE ($1 = FALSE OR is_published = TRUE)",
        )
        .bind(published_only)
        .fetch_one(pool)
        .await
    }

    /// Update title, slug, content or order. Only non-`None` fields apply.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdatePage,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!(
            "UPDATE pages SET
                title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                content = COALESCE($4, content),
                sort_order = COALESCE($5, sort_order)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.content)
            .bind(input.sort_order)
            .fetch_optional(pool)
            .await
    }

    /// Delete a page. Versions cascade; children become roots.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    /// Snapshot the current content as a version, then mark the page
    /// published. Both writes share one transaction.
    pub async fn publish(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<Page>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let content: Option<String> =
            sqlx::query_scalar("SELECT content FROM pages WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(content) = content else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO page_versions (page_id, content, published_by) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(&content)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE pages SET
                is_published = TRUE,
                published_at = NOW(),
                published_by = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let page = sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(page))
    }

    pub async fn unpublish(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!(
            "UPDATE pages SET
                is_published = FALSE,
                unpublished_at = NOW(),
                unpublished_by = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    /// List versions of a page, oldest first.
    pub async fn list_versions(
        pool: &PgPool,
        page_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PageVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM page_versions WHERE page_id = $1 \
             ORDER BY id ASC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(page_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_versions(pool: &PgPool, page_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM page_versions WHERE page_id = $1",
        )
        .bind(page_id)
        .fetch_one(pool)
        .await
    }

    /// Restore an earlier version's content.
    ///
    /// The current content is first kept as a new version carrying restore
    /// metadata. Returns `None` if the page or version does not exist.
    pub async fn restore_version(
        pool: &PgPool,
        page_id: DbId,
        version_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Page>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT content FROM pages WHERE id = $1 FOR UPDATE")
                .bind(page_id)
                .fetch_optional(&mut *tx)
                .await?;
        let target: Option<String> = sqlx::query_scalar(
            "SELECT content FROM page_versions WHERE id = $1 AND page_id = $2",
        )
        .bind(version_id)
        .bind(page_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (Some(current), Some(target)) = (current, target) else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO page_versions (page_id, content, published_by, restored_at, restored_by)
             VALUES ($1, $2, $3, NOW(), $3)",
        )
        .bind(page_id)
        .bind(&current)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let query = format!("UPDATE pages SET content = $2 WHERE id = $1 RETURNING {COLUMNS}");
        let page = sqlx::query_as::<_, Page>(&query)
            .bind(page_id)
            .bind(&target)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(page))
    }

    // -----------------------------------------------------------------------
    // Draft slot
    // -----------------------------------------------------------------------

    pub async fn find_draft(pool: &PgPool, id: DbId) -> Result<Option<PageDraft>, sqlx::Error> {
        sqlx::query_as::<_, PageDraft>(
            "SELECT draft_content, draft_saved_at, draft_saved_by FROM pages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Overwrite the draft slot.
    pub async fn save_draft(
        pool: &PgPool,
        id: DbId,
        content: &str,
        user_id: DbId,
    ) -> Result<Option<PageDraft>, sqlx::Error> {
        sqlx::query_as::<_, PageDraft>(
            "UPDATE pages SET
                draft_content = $2,
                draft_saved_at = NOW(),
                draft_saved_by = $3
             WHERE id = $1
             RETURNING draft_content, draft_saved_at, draft_saved_by",
        )
        .bind(id)
        .bind(content)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Empty the draft slot. Returns `false` if the page does not exist.
    pub async fn delete_draft(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pages SET
                draft_content = NULL,
                draft_saved_at = NULL,
                draft_saved_by = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Hierarchy
    // -----------------------------------------------------------------------

    /// Every page as a minimal outline row.
    pub async fn list_outlines(pool: &PgPool) -> Result<Vec<PageOutlineRow>, sqlx::Error> {
        sqlx::query_as::<_, PageOutlineRow>(
            "SELECT id, parent_id, sort_order, title, slug FROM pages \
             ORDER BY sort_order ASC, id ASC",
        )
        .fetch_all(pool)
        .await
    }

    /// Set a page's parent and position.
    pub async fn move_to(
        pool: &PgPool,
        id: DbId,
        parent_id: Option<DbId>,
        sort_order: i32,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!(
            "UPDATE pages SET parent_id = $2, sort_order = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .bind(parent_id)
            .bind(sort_order)
            .fetch_optional(pool)
            .await
    }

    /// Copy a page's content, parent and order under a new title and slug.
    ///
    /// The copy starts unpublished with no versions or draft.
    pub async fn duplicate(
        pool: &PgPool,
        source_id: DbId,
        title: &str,
        slug: &str,
        created_by: DbId,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!(
            "INSERT INTO pages (title, slug, content, parent_id, sort_order, created_by)
             SELECT $2, $3, content, parent_id, sort_order, $4 FROM pages WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(source_id)
            .bind(title)
            .bind(slug)
            .bind(created_by)
            .fetch_optional(pool)
            .await
    }
}
