//! List Pages
//!
//! List endpoints answer in one of two shapes: a bare JSON array, or an
//! envelope carrying the items plus paging totals. [`ListEnvelope`] decodes
//! either one and [`ListEnvelope::into_page`] normalizes both into a single
//! [`ListPage`], so nothing downstream of the dispatcher branches on shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::query::ListQuery;

/// Paging totals for one page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(total: u64, page: u32, size: u32) -> Self {
        let mut pagination = Self {
            total,
            page: page.max(1),
            size: size.max(1),
            total_pages: 0,
        };
        pagination.recompute_pages();
        pagination
    }

    /// Keep `total_pages` consistent with `total` and `size`
    pub fn recompute_pages(&mut self) {
        let size = self.size.max(1) as u64;
        self.total_pages = self.total.div_ceil(size) as u32;
    }

    /// Account for one record removed from the result set
    pub fn decrement_total(&mut self) {
        self.total = self.total.saturating_sub(1);
        self.recompute_pages();
    }
}

/// One page of list results in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<Value>,
    pub pagination: Pagination,
}

impl ListPage {
    pub fn new(items: Vec<Value>, pagination: Pagination) -> Self {
        Self { items, pagination }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The two response shapes a list endpoint may use
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope {
    /// `{"items": [...], "total": .., "page": .., "size": .., "pages": ..}`
    Paginated {
        #[serde(alias = "data", alias = "results")]
        items: Vec<Value>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default)]
        size: Option<u32>,
        #[serde(default, alias = "total_pages")]
        pages: Option<u32>,
    },
    /// `[...]`
    Bare(Vec<Value>),
}

impl ListEnvelope {
    /// Normalize into a [`ListPage`].
    ///
    /// Totals missing from the response are derived from the query: a bare
    /// array counts everything before this page plus the items it holds.
    pub fn into_page(self, query: &ListQuery) -> ListPage {
        match self {
            ListEnvelope::Paginated {
                items,
                total,
                page,
                size,
                pages,
            } => {
                let page = page.unwrap_or(query.page);
                let size = size.unwrap_or(query.size);
                let total = total.unwrap_or_else(|| Self::derived_total(query, items.len()));
                let mut pagination = Pagination::new(total, page, size);
                if let Some(pages) = pages {
                    pagination.total_pages = pages;
                }
                ListPage::new(items, pagination)
            }
            ListEnvelope::Bare(items) => {
                let total = Self::derived_total(query, items.len());
                ListPage::new(items, Pagination::new(total, query.page, query.size))
            }
        }
    }

    fn derived_total(query: &ListQuery, len: usize) -> u64 {
        (query.page.saturating_sub(1) as u64) * query.size as u64 + len as u64
    }
}
