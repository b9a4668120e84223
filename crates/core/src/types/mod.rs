//! Core types for Larder.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod metadata;
pub mod query;
pub mod quantity;

pub use email::{Email, EmailError};
pub use id::*;
pub use metadata::{Metadata, MetadataError};
pub use query::{Ownership, Page, PageRequest, PaginationError, Sort, SortField, SortOrder};
pub use quantity::{Quantity, QuantityError};
