//! Built-in role names.
//!
//! Role names form a closed set. The migrations seed one `roles` row per
//! variant and a `CHECK` constraint keeps the table inside the set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_EDITOR: &str = "Editor";
pub const ROLE_VIEWER: &str = "Viewer";

/// One of the role names the platform knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleName {
    Admin,
    Editor,
    Viewer,
}

/// Role that members of a deleted role are moved to.
pub const FALLBACK_ROLE: RoleName = RoleName::Viewer;

/// Role assigned to self-registered accounts.
pub const SIGNUP_ROLE: RoleName = RoleName::Viewer;

impl RoleName {
    pub const ALL: [RoleName; 3] = [RoleName::Admin, RoleName::Editor, RoleName::Viewer];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleName::Admin => ROLE_ADMIN,
            RoleName::Editor => ROLE_EDITOR,
            RoleName::Viewer => ROLE_VIEWER,
        }
    }

    /// Parse a role name. Matching is exact after trimming whitespace.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim() {
            ROLE_ADMIN => Ok(RoleName::Admin),
            ROLE_EDITOR => Ok(RoleName::Editor),
            ROLE_VIEWER => Ok(RoleName::Viewer),
            other => Err(CoreError::Validation(format!(
                "Unknown role name '{other}'. Expected one of: Admin, Editor, Viewer"
            ))),
        }
    }

    pub fn is_admin(self) -> bool {
        self == RoleName::Admin
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_known_names() {
        assert_eq!(RoleName::parse("Admin").unwrap(), RoleName::Admin);
        assert_eq!(RoleName::parse(" Editor ").unwrap(), RoleName::Editor);
        assert_eq!("Viewer".parse::<RoleName>().unwrap(), RoleName::Viewer);
    }

    #[test]
    fn rejects_unknown_and_miscased_names() {
        assert_matches!(RoleName::parse("admin"), Err(CoreError::Validation(_)));
        assert_matches!(RoleName::parse("Owner"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for role in RoleName::ALL {
            assert_eq!(RoleName::parse(&role.to_string()).unwrap(), role);
        }
    }

    #[test]
    fn fallback_is_viewer() {
        assert_eq!(FALLBACK_ROLE, RoleName::Viewer);
        assert!(!FALLBACK_ROLE.is_admin());
    }
}
