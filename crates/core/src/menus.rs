//! Menu item visibility, ordering and label rules.

use crate::error::CoreError;
use crate::roles::RoleName;
use crate::types::DbId;

/// An item with no role restriction is visible to every role.
pub fn item_visible_to(item_roles: &[String], role: RoleName) -> bool {
    item_roles.is_empty() || item_roles.iter().any(|r| r == role.as_str())
}

/// Check and de-duplicate the role list of a menu item.
pub fn validate_item_roles(roles: &[String]) -> Result<Vec<String>, CoreError> {
    let mut out: Vec<String> = Vec::with_capacity(roles.len());
    for raw in roles {
        let name = RoleName::parse(raw)?.as_str().to_string();
        if !out.contains(&name) {
            out.push(name);
        }
    }
    Ok(out)
}

/// New `sort_order` for each listed item that belongs to the menu.
///
/// Positions come from the index in `ordered_ids`. Ids not in the menu are
/// ignored and unlisted items keep their current order.
pub fn reorder(menu_item_ids: &[DbId], ordered_ids: &[DbId]) -> Vec<(DbId, i32)> {
    ordered_ids
        .iter()
        .enumerate()
        .filter(|(_, id)| menu_item_ids.contains(id))
        .map(|(idx, id)| (*id, idx as i32))
        .collect()
}

/// Whether `label` collides with another item of the same menu.
///
/// `existing` yields `(item_id, label)`; `exclude` skips the item being
/// updated.
pub fn label_taken<'a, I>(existing: I, label: &str, exclude: Option<DbId>) -> bool
where
    I: IntoIterator<Item = (DbId, &'a str)>,
{
    existing
        .into_iter()
        .any(|(id, existing_label)| Some(id) != exclude && existing_label == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_role_list_is_public() {
        assert!(item_visible_to(&[], RoleName::Viewer));
        assert!(item_visible_to(&roles(&["Editor"]), RoleName::Editor));
        assert!(!item_visible_to(&roles(&["Admin", "Editor"]), RoleName::Viewer));
    }

    #[test]
    fn item_roles_are_checked() {
        assert_eq!(
            validate_item_roles(&roles(&["Admin", " Admin", "Viewer"])).unwrap(),
            roles(&["Admin", "Viewer"])
        );
        assert_matches!(
            validate_item_roles(&roles(&["Guest"])),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn reorder_uses_list_index() {
        let assignments = reorder(&[10, 11, 12], &[12, 99, 10]);
        assert_eq!(assignments, vec![(12, 0), (10, 2)]);
    }

    #[test]
    fn label_conflicts() {
        let items = [(1, "Home"), (2, "About")];
        assert!(label_taken(items, "About", None));
        assert!(!label_taken(items, "About", Some(2)));
        assert!(label_taken(items, "Home", Some(2)));
        assert!(!label_taken(items, "Contact", None));
    }
}
