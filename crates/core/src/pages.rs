//! Page hierarchy helpers: slugs, tree assembly and move validation.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::CoreError;
use crate::types::DbId;

/// Derive a URL slug from a title.
///
/// Lowercases, collapses every run of non-alphanumeric characters into one
/// dash and trims leading and trailing dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Slug to use for a page: the caller's slug when given, else derived from
/// the title. Fails when neither yields a non-empty slug.
pub fn resolve_slug(explicit: Option<&str>, title: &str) -> Result<String, CoreError> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_lowercase(),
        None => slugify(title),
    };
    if slug.is_empty() {
        return Err(CoreError::Validation(
            "A slug could not be derived from the title".to_string(),
        ));
    }
    crate::validation::validate_slug(&slug)?;
    Ok(slug)
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Flat row used to build the page tree.
#[derive(Debug, Clone)]
pub struct PageOutline {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub sort_order: i32,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageTreeNode {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub sort_order: i32,
    pub title: String,
    pub slug: String,
    pub children: Vec<PageTreeNode>,
}

/// Nest flat rows under their parents.
///
/// Siblings are ordered by `sort_order`, then id. Rows whose parent is not
/// in the input are dropped along with their subtree.
pub fn build_tree(mut pages: Vec<PageOutline>) -> Vec<PageTreeNode> {
    pages.sort_by_key(|p| (p.sort_order, p.id));

    let mut children_of: HashMap<Option<DbId>, Vec<PageOutline>> = HashMap::new();
    for page in pages {
        children_of.entry(page.parent_id).or_default().push(page);
    }

    let mut visiting = HashSet::new();
    attach(None, &mut children_of, &mut visiting)
}

fn attach(
    parent: Option<DbId>,
    children_of: &mut HashMap<Option<DbId>, Vec<PageOutline>>,
    visiting: &mut HashSet<DbId>,
) -> Vec<PageTreeNode> {
    let Some(rows) = children_of.remove(&parent) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if !visiting.insert(row.id) {
            continue;
        }
        out.push(PageTreeNode {
            children: attach(Some(row.id), children_of, visiting),
            id: row.id,
            parent_id: row.parent_id,
            sort_order: row.sort_order,
            title: row.title,
            slug: row.slug,
        });
    }
    out
}

/// Whether moving `page_id` under `new_parent` would make the page its own
/// ancestor.
///
/// `parents` maps every page id to its current parent.
pub fn would_create_cycle(
    page_id: DbId,
    new_parent: Option<DbId>,
    parents: &HashMap<DbId, Option<DbId>>,
) -> bool {
    let mut seen = HashSet::new();
    let mut cursor = new_parent;
    while let Some(id) = cursor {
        if id == page_id {
            return true;
        }
        if !seen.insert(id) {
            // Pre-existing loop not involving this page.
            return false;
        }
        cursor = parents.get(&id).copied().flatten();
    }
    false
}
