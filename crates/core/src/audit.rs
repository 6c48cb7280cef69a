//! Audit trail vocabulary and the integrity hash chain.
//!
//! Every mutating request appends one entry. Actions and resources are closed
//! sets mirrored by `CHECK` constraints on the `audit_logs` table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing;
use crate::permissions::Resource;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::Validation(format!(
                        concat!("Unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

closed_set! {
    /// Verb recorded on an audit entry.
    AuditAction {
        Create => "create",
        Read => "read",
        Update => "update",
        Delete => "delete",
        Login => "login",
        Logout => "logout",
        Signup => "signup",
        Publish => "publish",
        Unpublish => "unpublish",
        Manage => "manage",
        AddItem => "add_item",
        UpdateItem => "update_item",
        DeleteItem => "delete_item",
        ReorderItems => "reorder_items",
        Duplicate => "duplicate",
        Move => "move",
        RestoreVersion => "restore_version",
        SaveDraft => "save_draft",
        DeleteDraft => "delete_draft",
        AssignRole => "assign_role",
        RemoveRole => "remove_role",
        UpdatePermissions => "update_permissions",
        VerifyEmail => "verify_email",
        ResendVerification => "resend_verification",
        RequestPasswordReset => "request_password_reset",
        ResetPassword => "reset_password",
        ChangePassword => "change_password",
        UpdateProfile => "update_profile",
    }
}

closed_set! {
    /// Resource family an audit entry is filed under.
    AuditResource {
        Users => "users",
        Pages => "pages",
        Menus => "menus",
        Roles => "roles",
        Security => "security",
        Auth => "auth",
    }
}

impl From<Resource> for AuditResource {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Users => AuditResource::Users,
            Resource::Pages => AuditResource::Pages,
            Resource::Menus => AuditResource::Menus,
            Resource::Roles => AuditResource::Roles,
            Resource::Security => AuditResource::Security,
        }
    }
}

// ---------------------------------------------------------------------------
// Integrity hash chain
// ---------------------------------------------------------------------------

/// Known seed value for the first entry in the hash chain.
const CHAIN_SEED: &str = "GATEHOUSE_AUDIT_CHAIN_V1";

/// Compute the SHA-256 integrity hash for an audit log entry.
///
/// `prev_hash` is the hash of the previous entry, or `None` for the first
/// entry in the chain.
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{entry_data}");
    hashing::sha256_hex(combined.as_bytes())
}

/// Canonical string form of an entry's content, fed to the hash chain.
///
/// The timestamp is encoded in microseconds, the precision PostgreSQL keeps.
pub fn canonical_entry(
    user_id: Option<DbId>,
    action: &str,
    resource: &str,
    details: &str,
    ip_address: Option<&str>,
    timestamp: Timestamp,
) -> String {
    let user = user_id.map(|id| id.to_string()).unwrap_or_default();
    let ip = ip_address.unwrap_or_default();
    let micros = timestamp.timestamp_micros();
    format!("{user}|{action}|{resource}|{details}|{ip}|{micros}")
}

/// One stored entry as seen by [`verify_chain`].
#[derive(Debug, Clone)]
pub struct ChainLink {
    pub id: DbId,
    pub entry_data: String,
    pub integrity_hash: String,
}

/// Outcome of walking the chain from the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub verified_entries: i64,
    pub chain_valid: bool,
    pub first_break: Option<DbId>,
}

/// Recompute every hash in id order and report the first mismatch.
pub fn verify_chain<I>(links: I) -> ChainVerification
where
    I: IntoIterator<Item = ChainLink>,
{
    let mut prev: Option<String> = None;
    let mut verified = 0;
    for link in links {
        let expected = compute_integrity_hash(prev.as_deref(), &link.entry_data);
        if expected != link.integrity_hash {
            return ChainVerification {
                verified_entries: verified,
                chain_valid: false,
                first_break: Some(link.id),
            };
        }
        verified += 1;
        prev = Some(link.integrity_hash);
    }
    ChainVerification {
        verified_entries: verified,
        chain_valid: true,
        first_break: None,
    }
}
