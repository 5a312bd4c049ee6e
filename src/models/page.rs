use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Caller-facing paging parameters of every `List*`/`Search*` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 0 selects the default page size
    pub page_size: i64,
    /// Decimal page index; empty for the first page
    pub page_token: String,
}

impl PageRequest {
    pub fn new(page_size: i64, page_token: impl Into<String>) -> Self {
        Self {
            page_size,
            page_token: page_token.into(),
        }
    }

    pub fn first(page_size: i64) -> Self {
        Self::new(page_size, "")
    }
}

/// Resolved window into a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub index: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_size: i64,
    pub next_page_token: Option<String>,
}
