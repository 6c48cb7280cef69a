//! Audit log entity models and query DTOs.
//!
//! Audit logs have no `updated_at` field: rows are immutable once written.

use gatehouse_core::audit::{canonical_entry, ChainLink};
use gatehouse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single audit log entry, joined with the actor's username when the
/// user still exists.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub username: Option<String>,
    pub action: String,
    pub resource: String,
    pub details: String,
    pub ip_address: Option<String>,
    pub integrity_hash: String,
    pub created_at: Timestamp,
}

impl AuditLog {
    /// Chain view of this entry for integrity verification.
    pub fn to_chain_link(&self) -> ChainLink {
        ChainLink {
            id: self.id,
            entry_data: canonical_entry(
                self.user_id,
                &self.action,
                &self.resource,
                &self.details,
                self.ip_address.as_deref(),
                self.created_at,
            ),
            integrity_hash: self.integrity_hash.clone(),
        }
    }
}

/// DTO for appending an entry. The hash and timestamp are computed on insert.
#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub user_id: Option<DbId>,
    pub action: String,
    pub resource: String,
    pub details: String,
    pub ip_address: Option<String>,
}

/// Filter parameters for querying audit logs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub user_id: Option<DbId>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub ip_address: Option<String>,
}
