//! Request handlers, one module per resource.

pub mod auth;
pub mod bulk;
pub mod menus;
pub mod pages;
pub mod roles;
pub mod security;
pub mod users;

use gatehouse_db::repositories::SecuritySettingsRepo;
use gatehouse_db::DbPool;

use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};

/// Check a new password against the stored policy and hash it.
pub(crate) async fn hash_new_password(pool: &DbPool, password: &str) -> AppResult<String> {
    let settings = SecuritySettingsRepo::get(pool).await?;
    settings.password_policy.check(password)?;
    hash_password(password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))
}
