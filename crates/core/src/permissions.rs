//! Resource × action permission model.
//!
//! A role carries an ordered list of [`Permission`] entries. Authorization
//! is a lookup: a request for `(resource, action)` is allowed when any entry
//! for that resource lists the action.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::RoleName;

/// A protected resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Users,
    Pages,
    Menus,
    Roles,
    Security,
}

/// An operation on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Users,
        Resource::Pages,
        Resource::Menus,
        Resource::Roles,
        Resource::Security,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Pages => "pages",
            Resource::Menus => "menus",
            Resource::Roles => "roles",
            Resource::Security => "security",
        }
    }
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown resource '{s}'")))
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown action '{s}'")))
    }
}

/// One `(resource, allowed actions)` pair of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

impl Permission {
    pub fn new(resource: Resource, actions: &[Action]) -> Self {
        Self {
            resource,
            actions: actions.to_vec(),
        }
    }
}

/// The normalized permission list of a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<Permission>);

impl PermissionSet {
    pub fn new(permissions: Vec<Permission>) -> Self {
        Self(normalize(permissions))
    }

    /// Whether this set grants `action` on `resource`.
    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.0
            .iter()
            .any(|p| p.resource == resource && p.actions.contains(&action))
    }

    pub fn entries(&self) -> &[Permission] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Permission> {
        self.0
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(permissions: Vec<Permission>) -> Self {
        Self::new(permissions)
    }
}

/// Merge entries that name the same resource and drop repeated actions.
///
/// The first occurrence of each resource keeps its position; actions keep
/// first-seen order.
pub fn normalize(permissions: Vec<Permission>) -> Vec<Permission> {
    let mut merged: Vec<Permission> = Vec::with_capacity(permissions.len());
    for perm in permissions {
        let idx = match merged.iter().position(|p| p.resource == perm.resource) {
            Some(idx) => idx,
            None => {
                merged.push(Permission {
                    resource: perm.resource,
                    actions: Vec::new(),
                });
                merged.len() - 1
            }
        };
        let slot = &mut merged[idx];
        for action in perm.actions {
            if !slot.actions.contains(&action) {
                slot.actions.push(action);
            }
        }
    }
    merged
}

/// Permission set seeded for each built-in role.
pub fn defaults_for(role: RoleName) -> PermissionSet {
    use Action::{Create, Delete, Read, Update};

    let entries = match role {
        RoleName::Admin => Resource::ALL
            .into_iter()
            .map(|r| Permission::new(r, &[Create, Read, Update, Delete]))
            .collect(),
        RoleName::Editor => vec![
            Permission::new(Resource::Pages, &[Create, Read, Update]),
            Permission::new(Resource::Menus, &[Read]),
            Permission::new(Resource::Users, &[Read]),
        ],
        RoleName::Viewer => vec![
            Permission::new(Resource::Pages, &[Read]),
            Permission::new(Resource::Menus, &[Read]),
        ],
    };
    PermissionSet::new(entries)
}
