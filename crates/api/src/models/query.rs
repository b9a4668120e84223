//! Listing filters and per-resource sort allow-lists.
//!
//! Each `*Sort` enum names the columns a resource may be ordered by. The
//! Postgres store turns them into `ORDER BY` clauses through [`SortColumn`];
//! the in-memory store compares the matching struct fields.

use serde::Deserialize;

use larder_core::{
    CategoryId, ListId, Ownership, PageRequest, PaginationError, PantryId, Sort, SortField,
    SortOrder, UserId,
};

/// A sort field that maps onto a SQL column expression.
pub trait SortColumn: SortField {
    /// Column (qualified where needed) used in `ORDER BY`.
    fn column(&self) -> &'static str;
}

macro_rules! sort_fields {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident $order:ident,
        { $($variant:ident => $param:literal : $column:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl SortField for $name {
            const DEFAULT: Self = Self::$default;
            const DEFAULT_ORDER: SortOrder = SortOrder::$order;

            fn parse(value: &str) -> Option<Self> {
                match value.trim() {
                    $($param => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl SortColumn for $name {
            fn column(&self) -> &'static str {
                match self {
                    $(Self::$variant => $column),+
                }
            }
        }
    };
}

sort_fields! {
    /// `GET /categories` sort fields.
    CategorySort, default = Name Asc,
    { Name => "name": "c.name", CreatedAt => "created_at": "c.created_at", UpdatedAt => "updated_at": "c.updated_at" }
}

sort_fields! {
    /// `GET /products` sort fields.
    ProductSort, default = Name Asc,
    { Name => "name": "p.name", CreatedAt => "created_at": "p.created_at", UpdatedAt => "updated_at": "p.updated_at" }
}

sort_fields! {
    /// `GET /lists` sort fields.
    ListSort, default = CreatedAt Desc,
    {
        Name => "name": "l.name",
        CreatedAt => "created_at": "l.created_at",
        UpdatedAt => "updated_at": "l.updated_at",
        LastPurchasedAt => "last_purchased_at": "l.last_purchased_at",
    }
}

sort_fields! {
    /// `GET /pantries` sort fields.
    PantrySort, default = Name Asc,
    { Name => "name": "pa.name", CreatedAt => "created_at": "pa.created_at", UpdatedAt => "updated_at": "pa.updated_at" }
}

sort_fields! {
    /// `GET /lists/{id}/items` sort fields.
    ListItemSort, default = CreatedAt Asc,
    { CreatedAt => "created_at": "i.created_at", UpdatedAt => "updated_at": "i.updated_at", Quantity => "quantity": "i.quantity" }
}

sort_fields! {
    /// `GET /pantries/{id}/items` sort fields.
    PantryItemSort, default = AddedAt Desc,
    {
        AddedAt => "added_at": "i.added_at",
        ExpirationDate => "expiration_date": "i.expiration_date",
        Quantity => "quantity": "i.quantity",
        CreatedAt => "created_at": "i.created_at",
    }
}

sort_fields! {
    /// `GET /purchases` sort fields.
    PurchaseSort, default = CreatedAt Desc,
    { CreatedAt => "created_at": "pu.created_at" }
}

/// Filters for `GET /categories`.
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    pub owner_id: UserId,
    pub search: Option<String>,
}

/// Filters for `GET /products`.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub owner_id: UserId,
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
}

/// Filters for `GET /lists` and `GET /pantries`.
#[derive(Debug, Clone)]
pub struct ShareableFilter {
    /// The caller; results are limited to what they can access.
    pub user_id: UserId,
    pub search: Option<String>,
    pub ownership: Ownership,
}

/// Filters for `GET /lists/{id}/items`. `search` matches the product name.
#[derive(Debug, Clone)]
pub struct ListItemFilter {
    pub list_id: ListId,
    pub search: Option<String>,
    pub purchased: Option<bool>,
}

/// Filters for `GET /pantries/{id}/items`. `search` matches the product name.
#[derive(Debug, Clone)]
pub struct PantryItemFilter {
    pub pantry_id: PantryId,
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
}

/// Filter, sort and page bundled together for a listing call.
#[derive(Debug, Clone)]
pub struct Listing<F, S> {
    pub filter: F,
    pub sort: Sort<S>,
    pub page: PageRequest,
}

/// Normalize a `search` parameter: trimmed, lower-cased, `None` when blank.
#[must_use]
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// Query string accepted by every listing endpoint.
///
/// Resources ignore the filters they do not support.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    /// `true` for mine, `false` for shared with me, absent for both.
    pub owner: Option<bool>,
    pub category_id: Option<CategoryId>,
    pub purchased: Option<bool>,
}

impl PageParams {
    /// Normalized `search` term.
    #[must_use]
    pub fn search(&self) -> Option<String> {
        normalize_search(self.search.as_deref())
    }

    /// Bundle a filter with the requested sort and page.
    ///
    /// # Errors
    ///
    /// Returns `PaginationError` if `page` or `per_page` is zero.
    pub fn listing<F, S: SortField>(&self, filter: F) -> Result<Listing<F, S>, PaginationError> {
        Ok(Listing {
            filter,
            sort: Sort::from_params(self.sort_by.as_deref(), self.order.as_deref()),
            page: PageRequest::new(self.page, self.per_page)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sort_falls_back() {
        let sort = Sort::<ListSort>::from_params(Some("password"), Some("sideways"));
        assert_eq!(sort.field, ListSort::CreatedAt);
        assert_eq!(sort.order, SortOrder::Desc);
    }

    #[test]
    fn test_sort_parses_allowed_fields() {
        let sort = Sort::<PantryItemSort>::from_params(Some("expiration_date"), Some("asc"));
        assert_eq!(sort.field, PantryItemSort::ExpirationDate);
        assert_eq!(sort.order, SortOrder::Asc);
        assert_eq!(sort.field.column(), "i.expiration_date");
    }

    #[test]
    fn test_normalize_search() {
        assert_eq!(normalize_search(Some("  MiLk ")), Some("milk".to_owned()));
        assert_eq!(normalize_search(Some("   ")), None);
        assert_eq!(normalize_search(None), None);
    }

    #[test]
    fn test_page_params_listing() {
        let params = PageParams {
            page: Some(2),
            per_page: Some(500),
            sort_by: Some("name".to_owned()),
            ..PageParams::default()
        };
        let listing: Listing<(), PantrySort> = params.listing(()).unwrap();
        assert_eq!(listing.page.per_page(), PageRequest::MAX_PER_PAGE);
        assert_eq!(listing.sort.field, PantrySort::Name);
        assert_eq!(listing.sort.order, SortOrder::Asc);

        let zero = PageParams {
            page: Some(0),
            ..PageParams::default()
        };
        assert!(zero.listing::<(), PantrySort>(()).is_err());
    }
}
