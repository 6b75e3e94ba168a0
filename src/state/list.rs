use crate::api::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::polling::FetchMode;

/// Page + filters for a paginated list endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            filters: BTreeMap::new(),
        }
    }

    /// Set (or with an empty value, remove) a filter. Any change sends the
    /// query back to page 1. Returns whether anything changed.
    pub fn set_filter(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = value.into().trim().to_string();
        let changed = if value.is_empty() {
            self.filters.remove(key).is_some()
        } else if self.filters.get(key) == Some(&value) {
            false
        } else {
            self.filters.insert(key.to_string(), value);
            true
        };
        if changed {
            self.page = 1;
        }
        changed
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(|s| s.as_str())
    }

    pub fn clear_filters(&mut self) -> bool {
        if self.filters.is_empty() {
            return false;
        }
        self.filters.clear();
        self.page = 1;
        true
    }

    pub fn go_to(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("page_size".to_string(), self.page_size.to_string()),
        ];
        pairs.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Pagination {
    #[serde(default = "one")]
    pub page: u32,
    #[serde(default = "one")]
    pub total_pages: u32,
    #[serde(default)]
    pub total: u64,
}

fn one() -> u32 {
    1
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            total_pages: 1,
            total: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct ListResult<T> {
    #[serde(alias = "documents", default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FetchOutcome {
    Applied,
    /// A newer request was started; this response was dropped.
    Stale,
    /// The requested page was past the end. State now points at the last
    /// real page and the caller should fetch it.
    Clamped(u32),
}

/// Component-local list state.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ListState<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub loading: bool,
    pub error: Option<String>,
    seq: u64,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            total_pages: 1,
            total_items: 0,
            loading: false,
            error: None,
            seq: 0,
        }
    }
}

impl<T> ListState<T> {
    /// Start a fetch. Only foreground fetches show the loading state.
    pub fn begin(&mut self, mode: FetchMode) -> u64 {
        self.seq += 1;
        if mode == FetchMode::Foreground {
            self.loading = true;
            self.error = None;
        }
        self.seq
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.seq
    }

    pub fn finish(&mut self, seq: u64, result: ApiResult<ListResult<T>>) -> FetchOutcome {
        if !self.is_current(seq) {
            return FetchOutcome::Stale;
        }
        self.loading = false;

        match result {
            Ok(res) => {
                let total_pages = res.pagination.total_pages.max(1);
                let requested = res.pagination.page.max(1);
                let page = requested.min(total_pages);

                self.total_pages = total_pages;
                self.total_items = res.pagination.total;
                self.page = page;
                self.error = None;

                if page != requested {
                    // Items for a page past the end are meaningless (empty);
                    // keep the previous ones until the clamped page arrives.
                    FetchOutcome::Clamped(page)
                } else {
                    self.items = res.items;
                    FetchOutcome::Applied
                }
            }
            Err(ApiError { message, .. }) => {
                self.items.clear();
                self.error = Some(message);
                FetchOutcome::Applied
            }
        }
    }
}
