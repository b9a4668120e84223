//! Pagination, sorting and ownership filters shared by every listing endpoint.
//!
//! Listing contract:
//!
//! - `page` starts at 1 (default 1), `per_page` is at least 1 (default 10,
//!   capped at [`PageRequest::MAX_PER_PAGE`])
//! - `sort_by` is checked against a per-resource allow-list ([`SortField`]);
//!   unknown values fall back to the resource default instead of erroring
//! - `order` is `ASC` or `DESC` in any case; unknown values fall back too
//! - responses are `{data, page, per_page, total}` ([`Page`])

use serde::{Deserialize, Serialize};

/// Errors that can occur when validating pagination parameters.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// `page` was zero.
    #[error("page must be at least 1")]
    InvalidPage,
    /// `per_page` was zero.
    #[error("per_page must be at least 1")]
    InvalidPerPage,
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Default page number.
    pub const DEFAULT_PAGE: u32 = 1;
    /// Default page size.
    pub const DEFAULT_PER_PAGE: u32 = 10;
    /// Largest page size a caller can ask for.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Validate raw query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is zero.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Result<Self, PaginationError> {
        let page = page.unwrap_or(Self::DEFAULT_PAGE);
        let per_page = per_page.unwrap_or(Self::DEFAULT_PER_PAGE);

        if page == 0 {
            return Err(PaginationError::InvalidPage);
        }
        if per_page == 0 {
            return Err(PaginationError::InvalidPerPage);
        }

        Ok(Self {
            page,
            per_page: per_page.min(Self::MAX_PER_PAGE),
        })
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    #[must_use]
    pub const fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    /// Cut one page out of an already filtered and sorted collection.
    #[must_use]
    pub fn slice<T>(&self, rows: Vec<T>) -> Page<T> {
        let total = rows.len() as u64;
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let data = rows
            .into_iter()
            .skip(skip)
            .take(self.per_page as usize)
            .collect();
        Page::new(data, *self, total)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub data: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Page size that was applied.
    pub per_page: u32,
    /// Total number of rows across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Assemble a page.
    #[must_use]
    pub const fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            data,
            page: request.page,
            per_page: request.per_page,
            total,
        }
    }

    /// Transform every row, keeping the paging information.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse `ASC` / `DESC` case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }

    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Apply this direction to an ascending comparison.
    #[must_use]
    pub const fn apply(&self, ordering: core::cmp::Ordering) -> core::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// A per-resource allow-list of sortable fields.
pub trait SortField: Sized + Copy {
    /// Field used when `sort_by` is absent or not allowed.
    const DEFAULT: Self;
    /// Direction used when `order` is absent or not recognized.
    const DEFAULT_ORDER: SortOrder;

    /// Parse an allowed field name.
    fn parse(value: &str) -> Option<Self>;
}

/// A resolved sort: field and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    /// Field to sort by.
    pub field: F,
    /// Direction.
    pub order: SortOrder,
}

impl<F: SortField> Sort<F> {
    /// Resolve raw `sort_by` / `order` parameters, falling back to defaults.
    #[must_use]
    pub fn from_params(sort_by: Option<&str>, order: Option<&str>) -> Self {
        Self {
            field: sort_by.and_then(F::parse).unwrap_or(F::DEFAULT),
            order: order
                .and_then(SortOrder::parse)
                .unwrap_or(F::DEFAULT_ORDER),
        }
    }
}

impl<F: SortField> Default for Sort<F> {
    fn default() -> Self {
        Self {
            field: F::DEFAULT,
            order: F::DEFAULT_ORDER,
        }
    }
}

/// Ownership filter for shareable resources (`owner` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ownership {
    /// Everything the caller can access (parameter absent).
    #[default]
    All,
    /// Only resources the caller owns (`owner=true`).
    Mine,
    /// Only resources shared with the caller (`owner=false`).
    SharedWithMe,
}

impl From<Option<bool>> for Ownership {
    fn from(owner: Option<bool>) -> Self {
        match owner {
            None => Self::All,
            Some(true) => Self::Mine,
            Some(false) => Self::SharedWithMe,
        }
    }
}
