//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod audit_repo;
pub mod menu_repo;
pub mod page_repo;
pub mod role_repo;
pub mod security_settings_repo;
pub mod user_repo;

pub use audit_repo::AuditLogRepo;
pub use menu_repo::MenuRepo;
pub use page_repo::PageRepo;
pub use role_repo::RoleRepo;
pub use security_settings_repo::SecuritySettingsRepo;
pub use user_repo::UserRepo;
