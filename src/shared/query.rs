//! List Queries
//!
//! A [`ListQuery`] describes one request against a list resource: free-text
//! search, multi-valued filters, sort order and pagination. Its [`CacheKey`]
//! is a canonical serialization: filter names are ordered and the values of
//! each filter are sorted and deduplicated, so `{status: [open, closed]}` and
//! `{status: [closed, open]}` land on the same cache entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default page size when a query does not set one
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Canonical, order-independent key of a list query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query parameters for a paginated list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub filters: BTreeMap<String, Vec<String>>,
    pub sort: Option<String>,
    /// 1-based page number
    pub page: u32,
    pub size: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            filters: BTreeMap::new(),
            sort: None,
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    /// Add one or more values to a filter
    pub fn filter<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn page(mut self, page: u32, size: u32) -> Self {
        self.page = page.max(1);
        self.size = size.max(1);
        self
    }

    fn canonical_filters(&self) -> Vec<(&str, Vec<&str>)> {
        self.filters
            .iter()
            .filter_map(|(name, values)| {
                let mut values: Vec<&str> = values.iter().map(String::as_str).collect();
                values.sort_unstable();
                values.dedup();
                if values.is_empty() {
                    None
                } else {
                    Some((name.as_str(), values))
                }
            })
            .collect()
    }

    /// Canonical key for the read cache
    pub fn cache_key(&self) -> CacheKey {
        let mut parts = Vec::new();
        if let Some(search) = &self.search {
            parts.push(format!("q={}", search.trim()));
        }
        for (name, values) in self.canonical_filters() {
            parts.push(format!("f.{}={}", name, values.join(",")));
        }
        if let Some(sort) = &self.sort {
            parts.push(format!("sort={}", sort));
        }
        parts.push(format!("page={}", self.page));
        parts.push(format!("size={}", self.size));
        CacheKey(parts.join("&"))
    }

    /// Query-string pairs for the list endpoint.
    ///
    /// Uses the backend's `skip`/`limit` paging; multi-valued filters are
    /// repeated, in canonical order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.trim().to_string()));
        }
        for (name, values) in self.canonical_filters() {
            for value in values {
                pairs.push((name.to_string(), value.to_string()));
            }
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        let skip = (self.page.saturating_sub(1) as u64) * self.size as u64;
        pairs.push(("skip".to_string(), skip.to_string()));
        pairs.push(("limit".to_string(), self.size.to_string()));
        pairs
    }
}
