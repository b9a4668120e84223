//! Paginated listings.
//!
//! Each listing is one `FROM ... WHERE ...` fragment pushed twice: once behind
//! `SELECT COUNT(*)` for the total and once behind the column list with
//! `ORDER BY`, `LIMIT` and `OFFSET`. Sort columns come from the allow-list
//! enums, never from raw input.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use larder_core::{Ownership, Page, PageRequest, Sort, UserId};

use super::catalog::{CATEGORY_COLUMNS, CategoryRow, PRODUCT_COLUMNS, ProductRow};
use super::lists::{LIST_COLUMNS, LIST_ITEM_COLUMNS, ListItemRow, ListRow};
use super::pantries::{PANTRY_COLUMNS, PANTRY_ITEM_COLUMNS, PantryItemRow, PantryRow};
use super::purchases::{PURCHASE_COLUMNS, PurchaseRow, load_items};
use super::{PgStore, contains_pattern};
use crate::db::{Queries, RepositoryError};
use crate::models::query::{
    CategoryFilter, CategorySort, ListItemFilter, ListItemSort, ListSort, Listing,
    PantryItemFilter, PantryItemSort, PantrySort, ProductFilter, ProductSort, PurchaseSort,
    ShareableFilter, SortColumn,
};
use crate::models::{Category, ListItem, Pantry, PantryItem, Product, Purchase, ShoppingList};

/// `ORDER BY` clause for a resolved sort, with the primary key as tie-breaker.
fn order_by<S: SortColumn>(sort: &Sort<S>, alias: &str) -> String {
    format!(
        "{} {} NULLS LAST, {alias}.id",
        sort.field.column(),
        sort.order.as_sql()
    )
}

/// Restrict a list or pantry query to what the caller can see.
fn push_shareable(
    qb: &mut QueryBuilder<'_, Postgres>,
    filter: &ShareableFilter,
    alias: &str,
    share_table: &str,
    share_column: &str,
) {
    let shared = format!(
        "EXISTS (SELECT 1 FROM {share_table} s WHERE s.{share_column} = {alias}.id AND s.user_id = "
    );

    match filter.ownership {
        Ownership::All => {
            qb.push(format!(" AND ({alias}.owner_id = "))
                .push_bind(filter.user_id)
                .push(format!(" OR {shared}"))
                .push_bind(filter.user_id)
                .push("))");
        }
        Ownership::Mine => {
            qb.push(format!(" AND {alias}.owner_id = "))
                .push_bind(filter.user_id);
        }
        Ownership::SharedWithMe => {
            qb.push(format!(" AND {shared}"))
                .push_bind(filter.user_id)
                .push(")");
        }
    }

    if let Some(search) = &filter.search {
        qb.push(format!(" AND {alias}.name ILIKE "))
            .push_bind(contains_pattern(search));
    }
}

/// Run a count and a page query over the same `FROM` fragment.
async fn fetch_page<R, T, F>(
    pool: &PgPool,
    columns: &str,
    push_from: F,
    order_by: &str,
    page: PageRequest,
) -> Result<Page<T>, RepositoryError>
where
    F: Fn(&mut QueryBuilder<'_, Postgres>) + Send + Sync,
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    T: TryFrom<R, Error = RepositoryError>,
{
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) ");
    push_from(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT ");
    select.push(columns).push(" ");
    push_from(&mut select);
    select
        .push(" ORDER BY ")
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(i64::from(page.per_page()))
        .push(" OFFSET ")
        .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

    let rows: Vec<R> = select.build_query_as::<R>().fetch_all(pool).await?;
    let data = rows
        .into_iter()
        .map(T::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(data, page, u64::try_from(total).unwrap_or_default()))
}

#[async_trait]
impl Queries for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }

    async fn page_categories(
        &self,
        listing: &Listing<CategoryFilter, CategorySort>,
    ) -> Result<Page<Category>, RepositoryError> {
        let filter = &listing.filter;
        let push_from = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push("FROM larder.category c WHERE c.deleted_at IS NULL AND c.owner_id = ")
                .push_bind(filter.owner_id);
            if let Some(search) = &filter.search {
                qb.push(" AND c.name ILIKE ")
                    .push_bind(contains_pattern(search));
            }
        };

        fetch_page::<CategoryRow, _, _>(
            self.pool(),
            CATEGORY_COLUMNS,
            push_from,
            &order_by(&listing.sort, "c"),
            listing.page,
        )
        .await
    }

    async fn page_products(
        &self,
        listing: &Listing<ProductFilter, ProductSort>,
    ) -> Result<Page<Product>, RepositoryError> {
        let filter = &listing.filter;
        let push_from = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push("FROM larder.product p WHERE p.deleted_at IS NULL AND p.owner_id = ")
                .push_bind(filter.owner_id);
            if let Some(search) = &filter.search {
                qb.push(" AND p.name ILIKE ")
                    .push_bind(contains_pattern(search));
            }
            if let Some(category_id) = filter.category_id {
                qb.push(" AND p.category_id = ").push_bind(category_id);
            }
        };

        fetch_page::<ProductRow, _, _>(
            self.pool(),
            PRODUCT_COLUMNS,
            push_from,
            &order_by(&listing.sort, "p"),
            listing.page,
        )
        .await
    }

    async fn page_lists(
        &self,
        listing: &Listing<ShareableFilter, ListSort>,
    ) -> Result<Page<ShoppingList>, RepositoryError> {
        let filter = &listing.filter;
        let push_from = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push("FROM larder.shopping_list l WHERE l.deleted_at IS NULL");
            push_shareable(qb, filter, "l", "larder.list_share", "list_id");
        };

        fetch_page::<ListRow, _, _>(
            self.pool(),
            LIST_COLUMNS,
            push_from,
            &order_by(&listing.sort, "l"),
            listing.page,
        )
        .await
    }

    async fn page_list_items(
        &self,
        listing: &Listing<ListItemFilter, ListItemSort>,
    ) -> Result<Page<ListItem>, RepositoryError> {
        let filter = &listing.filter;
        let push_from = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push(
                "FROM larder.shopping_list_item i \
                 JOIN larder.product p ON p.id = i.product_id \
                 WHERE i.deleted_at IS NULL AND i.list_id = ",
            )
            .push_bind(filter.list_id);
            if let Some(search) = &filter.search {
                qb.push(" AND p.name ILIKE ")
                    .push_bind(contains_pattern(search));
            }
            if let Some(purchased) = filter.purchased {
                qb.push(" AND i.purchased = ").push_bind(purchased);
            }
        };

        fetch_page::<ListItemRow, _, _>(
            self.pool(),
            LIST_ITEM_COLUMNS,
            push_from,
            &order_by(&listing.sort, "i"),
            listing.page,
        )
        .await
    }

    async fn page_pantries(
        &self,
        listing: &Listing<ShareableFilter, PantrySort>,
    ) -> Result<Page<Pantry>, RepositoryError> {
        let filter = &listing.filter;
        let push_from = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push("FROM larder.pantry pa WHERE pa.deleted_at IS NULL");
            push_shareable(qb, filter, "pa", "larder.pantry_share", "pantry_id");
        };

        fetch_page::<PantryRow, _, _>(
            self.pool(),
            PANTRY_COLUMNS,
            push_from,
            &order_by(&listing.sort, "pa"),
            listing.page,
        )
        .await
    }

    async fn page_pantry_items(
        &self,
        listing: &Listing<PantryItemFilter, PantryItemSort>,
    ) -> Result<Page<PantryItem>, RepositoryError> {
        let filter = &listing.filter;
        let push_from = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push(
                "FROM larder.pantry_item i \
                 JOIN larder.product p ON p.id = i.product_id \
                 WHERE i.deleted_at IS NULL AND i.pantry_id = ",
            )
            .push_bind(filter.pantry_id);
            if let Some(search) = &filter.search {
                qb.push(" AND p.name ILIKE ")
                    .push_bind(contains_pattern(search));
            }
            if let Some(category_id) = filter.category_id {
                qb.push(" AND p.category_id = ").push_bind(category_id);
            }
        };

        fetch_page::<PantryItemRow, _, _>(
            self.pool(),
            PANTRY_ITEM_COLUMNS,
            push_from,
            &order_by(&listing.sort, "i"),
            listing.page,
        )
        .await
    }

    async fn page_purchases(
        &self,
        listing: &Listing<UserId, PurchaseSort>,
    ) -> Result<Page<Purchase>, RepositoryError> {
        let owner_id = listing.filter;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM larder.purchase WHERE owner_id = $1 AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .fetch_one(self.pool())
        .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PURCHASE_COLUMNS} FROM larder.purchase pu \
             WHERE pu.deleted_at IS NULL AND pu.owner_id = "
        ));
        select
            .push_bind(owner_id)
            .push(" ORDER BY ")
            .push(order_by(&listing.sort, "pu"))
            .push(" LIMIT ")
            .push_bind(i64::from(listing.page.per_page()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(listing.page.offset()).unwrap_or(i64::MAX));

        let rows: Vec<PurchaseRow> = select.build_query_as().fetch_all(self.pool()).await?;

        let ids: Vec<_> = rows.iter().map(PurchaseRow::id).collect();
        let mut items = load_items(self.pool(), &ids).await?;

        let data = rows
            .into_iter()
            .map(|row| {
                let snapshot = items.remove(&row.id()).unwrap_or_default();
                row.into_purchase(snapshot)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(
            data,
            listing.page,
            u64::try_from(total).unwrap_or_default(),
        ))
    }
}
