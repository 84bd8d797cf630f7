//! Limit/offset pagination utilities.

use serde::{Deserialize, Serialize};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Maximum page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Query parameters for paginated list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl PageQuery {
    /// Returns the effective limit, clamped to `MAX_PAGE_SIZE`.
    ///
    /// A zero limit is treated as the default rather than an empty page.
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.limit.min(MAX_PAGE_SIZE)
        }
    }

    /// Applies this page to a fully materialized, already-ordered slice.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset.min(items.len());
        let end = (start + self.effective_limit()).min(items.len());
        &items[start..end]
    }
}

/// Envelope for a paginated response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Paged<T> {
    /// Builds a page envelope from the full result set and the query.
    pub fn from_full(items: Vec<T>, query: PageQuery) -> Self
    where
        T: Clone,
    {
        let total = items.len();
        let data = query.slice(&items).to_vec();
        Self {
            data,
            total,
            limit: query.effective_limit(),
            offset: query.offset,
        }
    }
}
