//! Page-number pagination with a fixed page size.

use crate::core::{InterfaceError, Result};
use serde::{Deserialize, Serialize};

pub const PAGE_SIZE: u64 = 100;

/// `?page=N` query parameter. Kept as text so malformed numbers get the same
/// error as out-of-range ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Requested page number, 1-based. Absent means the first page.
    pub fn number(&self) -> Result<u64> {
        match self.page.as_deref() {
            None => Ok(1),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(invalid_page),
        }
    }
}

/// Offset of page `number` once `count` rows are known to exist.
///
/// The first page is always valid, even for an empty table.
pub fn offset_for(number: u64, count: u64) -> Result<u64> {
    let last = count.div_ceil(PAGE_SIZE).max(1);
    if number == 0 || number > last {
        return Err(invalid_page());
    }
    Ok((number - 1) * PAGE_SIZE)
}

/// One page of results before links are attached.
#[derive(Debug, Clone)]
pub struct PageSlice<T> {
    pub count: u64,
    pub number: u64,
    pub results: Vec<T>,
}

impl<T> PageSlice<T> {
    /// Attaches `next`/`previous` links relative to the request `path`.
    pub fn into_page(self, path: &str) -> Page<T> {
        let next = (self.number * PAGE_SIZE < self.count)
            .then(|| format!("{}?page={}", path, self.number + 1));
        let previous = match self.number {
            0 | 1 => None,
            2 => Some(path.to_string()),
            n => Some(format!("{}?page={}", path, n - 1)),
        };

        Page {
            count: self.count,
            next,
            previous,
            results: self.results,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

fn invalid_page() -> InterfaceError {
    InterfaceError::NotFound("Invalid page.".to_string())
}
