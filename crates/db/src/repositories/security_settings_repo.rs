//! Repository for the single-row `security_settings` table.

use gatehouse_core::security::SecuritySettings;
use gatehouse_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::security::SecuritySettingsRow;

const COLUMNS: &str = "settings, updated_by, updated_at";

/// Reads and replaces the settings document.
pub struct SecuritySettingsRepo;

impl SecuritySettingsRepo {
    /// Load the settings row, falling back to defaults if it is missing.
    pub async fn get(pool: &PgPool) -> Result<SecuritySettings, sqlx::Error> {
        Ok(Self::get_row(pool)
            .await?
            .map(|row| row.settings.0)
            .unwrap_or_default())
    }

    pub async fn get_row(pool: &PgPool) -> Result<Option<SecuritySettingsRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM security_settings WHERE id = 1");
        sqlx::query_as::<_, SecuritySettingsRow>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Replace the settings document.
    pub async fn save(
        pool: &PgPool,
        settings: &SecuritySettings,
        updated_by: DbId,
    ) -> Result<SecuritySettingsRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO security_settings (id, settings, updated_by) VALUES (1, $1, $2)
             ON CONFLICT (id) DO UPDATE SET settings = EXCLUDED.settings,
                                            updated_by = EXCLUDED.updated_by
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SecuritySettingsRow>(&query)
            .bind(Json(settings))
            .bind(updated_by)
            .fetch_one(pool)
            .await
    }
}
