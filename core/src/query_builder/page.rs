use serde::Serialize;

use crate::value::Row;

/// One page of results plus the arithmetic needed to render pagination links.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub data: Vec<Row>,
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    /// 1-based index of the first row on this page.
    pub from: u64,
    /// 1-based index of the last row on this page.
    pub to: u64,
}

/// Rows skipped before `page`. Saturates at the largest offset a database accepts.
pub(crate) fn offset(page: u64, per_page: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(per_page).min(i64::MAX as u64)
}

impl Page {
    /// `page` must already be clamped to at least 1, and `per_page` must be non-zero.
    pub(crate) fn new(data: Vec<Row>, page: u64, per_page: u64, total: u64) -> Self {
        let offset = offset(page, per_page);
        Self {
            data,
            current_page: page,
            per_page,
            total,
            last_page: total.div_ceil(per_page),
            from: offset.saturating_add(1),
            to: std::cmp::min(offset.saturating_add(per_page), total),
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}
