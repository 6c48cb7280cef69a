//! Shared query parameter types for API handlers.

use gatehouse_core::validation::{
    clamp_limit, clamp_offset, PageWindow, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
use serde::Deserialize;

/// Offset pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Clamped `(limit, offset)` pair ready for a repository call.
    pub fn resolve(&self) -> (i64, i64) {
        (
            clamp_limit(self.limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT),
            clamp_offset(self.offset),
        )
    }
}

/// Page-number pagination parameters (`?page=&limit=`).
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.limit)
    }
}
