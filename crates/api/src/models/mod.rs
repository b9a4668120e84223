//! Domain models for Larder.
//!
//! These are plain data structs. They carry no persistence behavior; the
//! [`crate::db`] traits load and save them, and the [`crate::services`]
//! functions implement the business rules on top.
//!
//! Every entity is soft-deletable (`deleted_at`) and carries audit timestamps.

pub mod catalog;
pub mod list;
pub mod pantry;
pub mod purchase;
pub mod query;
pub mod user;

pub use catalog::{Category, NewCategory, NewProduct, Product};
pub use list::{ListDetail, ListItem, NewList, NewListItem, ShoppingList};
pub use pantry::{NewPantry, NewPantryItem, Pantry, PantryDetail, PantryItem};
pub use purchase::{NewPurchase, NewPurchaseItem, Purchase, PurchaseItem};
pub use user::{CodePurpose, CurrentUser, NewUser, User, VerificationCode};
