// src/services/list_service.rs
//
// List-fetching contract consumed by PaginatedList.
//
// Wire shape of a page: { list, total?, next_marker?, no_more? }
// Offset lists report total or rely on a short page; cursor lists report next_marker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Service;

/// Open, caller-defined filter mapping merged into every list request
pub type Filters = serde_json::Map<String, Value>;

/// Parameters for one page request. Filters serialize flat next to the paging fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchParams {
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_marker: Option<String>,
    #[serde(flatten)]
    pub filters: Filters,
}

impl FetchParams {
    pub fn first_page(page_size: u32, filters: Filters) -> Self {
        Self {
            page: 1,
            page_size,
            next_marker: None,
            filters,
        }
    }

    pub fn filter(&self, key: &str) -> Option<&Value> {
        self.filters.get(key)
    }

    pub fn filter_str(&self, key: &str) -> Option<&str> {
        self.filters.get(key).and_then(Value::as_str)
    }
}

/// One page as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPayload<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    pub total: Option<u64>,
    pub next_marker: Option<String>,
    pub no_more: Option<bool>,
}

impl<T> ListPayload<T> {
    pub fn page(list: Vec<T>) -> Self {
        Self {
            list,
            total: None,
            next_marker: None,
            no_more: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.next_marker = Some(marker.into());
        self
    }

    pub fn finished(mut self) -> Self {
        self.no_more = Some(true);
        self
    }
}

pub type ListService<T> = dyn Service<FetchParams, ListPayload<T>>;
