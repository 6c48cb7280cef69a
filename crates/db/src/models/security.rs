//! The single-row security settings document.

use gatehouse_core::security::SecuritySettings;
use gatehouse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SecuritySettingsRow {
    pub settings: Json<SecuritySettings>,
    pub updated_by: Option<DbId>,
    pub updated_at: Timestamp,
}
