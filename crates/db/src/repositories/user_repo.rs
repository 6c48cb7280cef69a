//! Repository for the `users` table.
//!
//! Besides CRUD this owns the token store: only SHA-256 digests of issued
//! tokens are written, together with their expiry.

use gatehouse_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user::{CreateUser, SessionTokens, UpdateUser, User, UserResponse};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, password_hash, role_id, is_verified, \
                       verification_token_hash, verification_token_expires_at, \
                       reset_token_hash, reset_token_expires_at, \
                       access_token_hash, access_token_expires_at, \
                       refresh_token_hash, refresh_token_expires_at, \
                       last_login_at, created_at, updated_at";

/// Columns for [`UserResponse`]; expects `users u JOIN roles r`.
const RESPONSE_COLUMNS: &str = "u.id, u.username, u.email, r.name AS role, u.role_id, \
                                u.is_verified, u.last_login_at, u.created_at, u.updated_at";

/// Provides CRUD and token-store operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role_id, is_verified)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(input.role_id)
            .bind(input.is_verified)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email. Emails are stored lowercased.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Load the API view of one user.
    pub async fn find_response(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<UserResponse>, sqlx::Error> {
        let query = format!(
            "SELECT {RESPONSE_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.id = $1"
        );
        sqlx::query_as::<_, UserResponse>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List users, most recently created first.
    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserResponse>, sqlx::Error> {
        let query = format!(
            "SELECT {RESPONSE_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             ORDER BY u.created_at DESC, u.id DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, UserResponse>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*)::BIGINT FROM users")
            .fetch_one(pool)
            .await
    }

    /// List the members of a role ordered by username.
    pub async fn list_by_role(
        pool: &PgPool,
        role_id: DbId,
    ) -> Result<Vec<UserResponse>, sqlx::Error> {
        let query = format!(
            "SELECT {RESPONSE_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.role_id = $1 ORDER BY u.username ASC"
        );
        sqlx::query_as::<_, UserResponse>(&query)
            .bind(role_id)
            .fetch_all(pool)
            .await
    }

    /// Update a user. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateUser,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                role_id = COALESCE($4, role_id),
                is_verified = COALESCE($5, is_verified)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&input.username)
            .bind(&input.email)
            .bind(input.role_id)
            .bind(input.is_verified)
            .fetch_optional(pool)
            .await
    }

    /// Hard-delete a user. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move the listed users to `role_id`. Returns the number of rows changed.
    pub async fn assign_role(
        pool: &PgPool,
        user_ids: &[DbId],
        role_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role_id = $2 WHERE id = ANY($1)")
            .bind(user_ids)
            .bind(role_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Move the listed members of `from_role` to `to_role`.
    ///
    /// Users not currently in `from_role` are left alone.
    pub async fn reassign_members(
        pool: &PgPool,
        user_ids: &[DbId],
        from_role: DbId,
        to_role: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET role_id = $3 WHERE id = ANY($1) AND role_id = $2")
                .bind(user_ids)
                .bind(from_role)
                .bind(to_role)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Token store
    // -----------------------------------------------------------------------

    /// Replace both stored session token digests.
    pub async fn store_session_tokens(
        pool: &PgPool,
        id: DbId,
        tokens: &SessionTokens,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                access_token_hash = $2,
                access_token_expires_at = $3,
                refresh_token_hash = $4,
                refresh_token_expires_at = $5
             WHERE id = $1",
        )
        .bind(id)
        .bind(&tokens.access_token_hash)
        .bind(tokens.access_token_expires_at)
        .bind(&tokens.refresh_token_hash)
        .bind(tokens.refresh_token_expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Rotate the token pair only if the presented refresh digest is still
    /// the stored one. Returns `false` when another refresh won the race.
    pub async fn rotate_session_tokens(
        pool: &PgPool,
        id: DbId,
        presented_refresh_hash: &str,
        tokens: &SessionTokens,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET
                access_token_hash = $3,
                access_token_expires_at = $4,
                refresh_token_hash = $5,
                refresh_token_expires_at = $6
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(presented_refresh_hash)
        .bind(&tokens.access_token_hash)
        .bind(tokens.access_token_expires_at)
        .bind(&tokens.refresh_token_hash)
        .bind(tokens.refresh_token_expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop both stored session tokens, invalidating any outstanding ones.
    pub async fn clear_session_tokens(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                access_token_hash = NULL,
                access_token_expires_at = NULL,
                refresh_token_hash = NULL,
                refresh_token_expires_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Set `last_login_at` to now.
    pub async fn record_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Replace the password hash and clear every outstanding token.
    ///
    /// Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET
                password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                access_token_hash = NULL,
                access_token_expires_at = NULL,
                refresh_token_hash = NULL,
                refresh_token_expires_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a password-reset token digest.
    pub async fn set_reset_token(
        pool: &PgPool,
        id: DbId,
        token_hash: &str,
        expires_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find the user holding an unexpired reset token with this digest.
    pub async fn find_by_reset_token(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > NOW()"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Store an email-verification token digest.
    pub async fn set_verification_token(
        pool: &PgPool,
        id: DbId,
        token_hash: &str,
        expires_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                verification_token_hash = $2,
                verification_token_expires_at = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find the user holding an unexpired verification token with this digest.
    pub async fn find_by_verification_token(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users \
             WHERE verification_token_hash = $1 AND verification_token_expires_at > NOW()"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Mark the email verified and consume the verification token.
    pub async fn mark_verified(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                is_verified = TRUE,
                verification_token_hash = NULL,
                verification_token_expires_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
