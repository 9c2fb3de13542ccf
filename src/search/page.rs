//! Page of results with a lazily computed total.

use crate::error::AppError;
use crate::search::PageRequest;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page {
    pub content: Vec<Value>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
}

impl Page {
    /// Build a page, calling `count` only when the total cannot be derived from the slice:
    /// a partial first page, or any partial non-empty page, carries its own total.
    pub fn lazy<F>(content: Vec<Value>, request: &PageRequest, count: F) -> Result<Page, AppError>
    where
        F: FnOnce() -> Result<u64, AppError>,
    {
        let len = content.len() as u64;
        let offset = request.offset();
        let total = if len < request.size && (offset == 0 || len > 0) {
            offset + len
        } else {
            count()?
        };
        Ok(Page {
            content,
            page: request.page,
            size: request.size,
            total,
        })
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(self.size)
        }
    }
}
