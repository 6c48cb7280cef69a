//! Audit trail recorder.
//!
//! Handlers call [`record`] after a mutation succeeds. The entry is appended
//! to the hash-chained `audit_logs` table and echoed as an INFO event. A
//! failed write is logged at ERROR and otherwise ignored: auditing never
//! fails the request that triggered it.

use gatehouse_core::audit::{AuditAction, AuditResource};
use gatehouse_core::types::DbId;
use gatehouse_db::models::audit::CreateAuditLog;
use gatehouse_db::repositories::AuditLogRepo;
use gatehouse_db::DbPool;

/// Who performed an audited action.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: Option<DbId>,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn new(user_id: DbId, ip_address: Option<String>) -> Self {
        Self {
            user_id: Some(user_id),
            ip_address,
        }
    }
}

/// Append one audit entry.
pub async fn record(
    pool: &DbPool,
    actor: &Actor,
    action: AuditAction,
    resource: impl Into<AuditResource>,
    details: impl Into<String>,
) {
    let resource = resource.into();
    let entry = CreateAuditLog {
        user_id: actor.user_id,
        action: action.as_str().to_string(),
        resource: resource.as_str().to_string(),
        details: details.into(),
        ip_address: actor.ip_address.clone(),
    };

    tracing::info!(
        user_id = ?entry.user_id,
        %action,
        %resource,
        ip = ?entry.ip_address,
        details = %entry.details,
        "Audit",
    );

    if let Err(e) = AuditLogRepo::append(pool, &entry).await {
        tracing::error!(
            error = %e,
            %action,
            %resource,
            "Failed to write audit log entry",
        );
    }
}
