//! Shared request parameters

use gpuniq_core::{Error, Query};

/// Page-based pagination (`page`, `page_size`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl Paging {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub(crate) fn apply(&self, query: Query) -> Query {
        query.set("page", self.page).set("page_size", self.page_size)
    }
}

/// Offset-based pagination (`limit`, `offset`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u32,
    pub offset: u32,
}

impl Window {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Window of `limit` items starting at zero
    pub fn first(limit: u32) -> Self {
        Self::new(limit, 0)
    }

    pub(crate) fn apply(&self, query: Query) -> Query {
        query.set("limit", self.limit).set("offset", self.offset)
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::first(50)
    }
}

/// Argument rejected locally, before any request is sent
pub(crate) fn invalid_argument(message: impl Into<String>) -> Error {
    Error::Platform {
        message: message.into(),
        error_code: Some("VALIDATION_ERROR".to_string()),
        http_status: None,
        details: None,
    }
}
