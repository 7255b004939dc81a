//! Shared limit/offset pagination helpers.

use serde::Serialize;

use super::error::AppError;

pub const DEFAULT_LIMIT: i64 = 25;
pub const MAX_LIMIT: i64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PageRequest {
    /// Validate raw query values. The offset must land on a page boundary.
    pub fn parse(limit: Option<i64>, offset: Option<i64>) -> Result<Self, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::invalid_input(format!(
                "limit ({limit}) must be between 1 and {MAX_LIMIT}"
            )));
        }

        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(AppError::invalid_input(format!(
                "offset ({offset}) cannot be negative"
            )));
        }
        if offset % limit != 0 {
            return Err(AppError::invalid_input(format!(
                "offset ({offset}) must be a multiple of limit ({limit})"
            )));
        }

        Ok(Self { limit, offset })
    }

    /// Reject offsets past the last page.
    pub fn ensure_within(&self, total: i64) -> Result<(), AppError> {
        if self.offset > max_offset(total, self.limit) {
            return Err(AppError::invalid_input(format!(
                "not enough records, offset ({}) would return an empty page",
                self.offset
            )));
        }
        Ok(())
    }
}

pub fn page_count(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// Offset of the last page; `0` when there is nothing to page through.
pub fn max_offset(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    ((total - 1) / limit) * limit
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub pages: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            pages: page_count(total, request.limit),
            limit: request.limit,
            offset: request.offset,
        }
    }
}
