//! In-process implementation of the store traits.
//!
//! Used by tests and local demos. A unit of work takes the single state lock,
//! works on a private copy and writes it back on commit, so an uncommitted
//! unit of work leaves no trace. Live-row uniqueness rules mirror the partial
//! unique indexes of the `PostgreSQL` schema.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use larder_core::{
    CategoryId, Email, ListId, ListItemId, Ownership, Page, PantryId, PantryItemId, ProductId,
    PurchaseId, PurchaseItemId, SortOrder, UserId,
};

use super::{
    CategoryRepository, ListItemRepository, ListRepository, PantryItemRepository,
    PantryRepository, ProductRepository, PurchaseRepository, Queries, RepositoryError, Store,
    UnitOfWork, UserRepository,
};
use crate::models::query::{
    CategoryFilter, CategorySort, ListItemFilter, ListItemSort, ListSort, Listing,
    PantryItemFilter, PantryItemSort, PantrySort, ProductFilter, ProductSort, PurchaseSort,
    ShareableFilter,
};
use crate::models::{
    Category, CodePurpose, ListItem, NewCategory, NewList, NewListItem, NewPantry, NewPantryItem,
    NewProduct, NewPurchase, NewUser, Pantry, PantryItem, Product, Purchase, PurchaseItem,
    ShoppingList, User, VerificationCode,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i32,
    users: BTreeMap<UserId, User>,
    codes: HashMap<(UserId, CodePurpose), VerificationCode>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    lists: BTreeMap<ListId, ShoppingList>,
    list_items: BTreeMap<ListItemId, ListItem>,
    pantries: BTreeMap<PantryId, Pantry>,
    pantry_items: BTreeMap<PantryItemId, PantryItem>,
    purchases: BTreeMap<PurchaseId, Purchase>,
}

impl MemoryState {
    const fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn product_name(&self, id: ProductId) -> Option<&str> {
        self.products.get(&id).map(|p| p.name.as_str())
    }
}

/// Store that keeps everything in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = MemoryState::clone(&guard);
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

/// Holds the state lock for its whole lifetime.
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

fn live<T>(deleted_at: Option<&T>) -> bool {
    deleted_at.is_none()
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl UserRepository for MemoryUnitOfWork {
    async fn insert_user(&mut self, user: NewUser) -> Result<User, RepositoryError> {
        let state = &mut self.working;
        if state
            .users
            .values()
            .any(|u| live(u.deleted_at.as_ref()) && u.email == user.email)
        {
            return Err(RepositoryError::Conflict("email already registered".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(state.next_id()),
            email: user.email,
            password_hash: user.password_hash,
            display_name: user.display_name,
            email_verified: user.email_verified,
            metadata: larder_core::Metadata::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .working
            .users
            .get(&id)
            .filter(|u| live(u.deleted_at.as_ref()))
            .cloned())
    }

    async fn find_user_by_email(&mut self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| live(u.deleted_at.as_ref()) && &u.email == email)
            .cloned())
    }

    async fn find_users_by_emails(
        &mut self,
        emails: &[Email],
    ) -> Result<Vec<User>, RepositoryError> {
        Ok(self
            .working
            .users
            .values()
            .filter(|u| live(u.deleted_at.as_ref()) && emails.contains(&u.email))
            .cloned()
            .collect())
    }

    async fn save_user(&mut self, user: &User) -> Result<User, RepositoryError> {
        let state = &mut self.working;
        if user.deleted_at.is_none()
            && state.users.values().any(|u| {
                u.id != user.id && live(u.deleted_at.as_ref()) && u.email == user.email
            })
        {
            return Err(RepositoryError::Conflict("email already registered".to_owned()));
        }

        let stored = state.users.get_mut(&user.id).ok_or(RepositoryError::NotFound)?;
        *stored = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(stored.clone())
    }

    async fn store_code(&mut self, code: &VerificationCode) -> Result<(), RepositoryError> {
        self.working
            .codes
            .insert((code.user_id, code.purpose), code.clone());
        Ok(())
    }

    async fn find_code(
        &mut self,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>, RepositoryError> {
        Ok(self.working.codes.get(&(user_id, purpose)).cloned())
    }

    async fn delete_code(
        &mut self,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> Result<(), RepositoryError> {
        self.working.codes.remove(&(user_id, purpose));
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

fn category_name_taken(state: &MemoryState, owner: UserId, name: &str, except: Option<CategoryId>) -> bool {
    state.categories.values().any(|c| {
        Some(c.id) != except && live(c.deleted_at.as_ref()) && c.owner_id == owner && c.name == name
    })
}

#[async_trait]
impl CategoryRepository for MemoryUnitOfWork {
    async fn insert_category(
        &mut self,
        category: NewCategory,
    ) -> Result<Category, RepositoryError> {
        let state = &mut self.working;
        if category_name_taken(state, category.owner_id, &category.name, None) {
            return Err(RepositoryError::Conflict("category name already exists".to_owned()));
        }

        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(state.next_id()),
            name: category.name,
            owner_id: category.owner_id,
            metadata: category.metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self
            .working
            .categories
            .get(&id)
            .filter(|c| live(c.deleted_at.as_ref()))
            .cloned())
    }

    async fn save_category(&mut self, category: &Category) -> Result<Category, RepositoryError> {
        let state = &mut self.working;
        if category.deleted_at.is_none()
            && category_name_taken(state, category.owner_id, &category.name, Some(category.id))
        {
            return Err(RepositoryError::Conflict("category name already exists".to_owned()));
        }

        let stored = state
            .categories
            .get_mut(&category.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = Category {
            updated_at: Utc::now(),
            ..category.clone()
        };
        Ok(stored.clone())
    }
}

fn product_name_taken(state: &MemoryState, owner: UserId, name: &str, except: Option<ProductId>) -> bool {
    state.products.values().any(|p| {
        Some(p.id) != except && live(p.deleted_at.as_ref()) && p.owner_id == owner && p.name == name
    })
}

#[async_trait]
impl ProductRepository for MemoryUnitOfWork {
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product, RepositoryError> {
        let state = &mut self.working;
        if product_name_taken(state, product.owner_id, &product.name, None) {
            return Err(RepositoryError::Conflict("product name already exists".to_owned()));
        }

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(state.next_id()),
            name: product.name,
            description: product.description,
            unit: product.unit,
            default_quantity: product.default_quantity,
            category_id: product.category_id,
            pantry_id: None,
            owner_id: product.owner_id,
            metadata: product.metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .working
            .products
            .get(&id)
            .filter(|p| live(p.deleted_at.as_ref()))
            .cloned())
    }

    async fn save_product(&mut self, product: &Product) -> Result<Product, RepositoryError> {
        let state = &mut self.working;
        if product.deleted_at.is_none()
            && product_name_taken(state, product.owner_id, &product.name, Some(product.id))
        {
            return Err(RepositoryError::Conflict("product name already exists".to_owned()));
        }

        let stored = state
            .products
            .get_mut(&product.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = Product {
            updated_at: Utc::now(),
            ..product.clone()
        };
        Ok(stored.clone())
    }
}

// =============================================================================
// Lists
// =============================================================================

fn list_name_taken(state: &MemoryState, owner: UserId, name: &str, except: Option<ListId>) -> bool {
    state.lists.values().any(|l| {
        Some(l.id) != except && live(l.deleted_at.as_ref()) && l.owner_id == owner && l.name == name
    })
}

fn list_product_taken(
    state: &MemoryState,
    list_id: ListId,
    product_id: ProductId,
    except: Option<ListItemId>,
) -> bool {
    state.list_items.values().any(|i| {
        Some(i.id) != except
            && live(i.deleted_at.as_ref())
            && i.list_id == list_id
            && i.product_id == product_id
    })
}

#[async_trait]
impl ListRepository for MemoryUnitOfWork {
    async fn insert_list(&mut self, list: NewList) -> Result<ShoppingList, RepositoryError> {
        let state = &mut self.working;
        if list_name_taken(state, list.owner_id, &list.name, None) {
            return Err(RepositoryError::Conflict("list name already exists".to_owned()));
        }

        let now = Utc::now();
        let list = ShoppingList {
            id: ListId::new(state.next_id()),
            name: list.name,
            description: list.description,
            recurring: list.recurring,
            last_purchased_at: None,
            owner_id: list.owner_id,
            shared_with: Vec::new(),
            metadata: list.metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.lists.insert(list.id, list.clone());
        Ok(list)
    }

    async fn find_list(
        &mut self,
        id: ListId,
        include_deleted: bool,
    ) -> Result<Option<ShoppingList>, RepositoryError> {
        Ok(self
            .working
            .lists
            .get(&id)
            .filter(|l| include_deleted || live(l.deleted_at.as_ref()))
            .cloned())
    }

    async fn list_names(&mut self, owner_id: UserId) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .working
            .lists
            .values()
            .filter(|l| l.owner_id == owner_id && live(l.deleted_at.as_ref()))
            .map(|l| l.name.clone())
            .collect())
    }

    async fn save_list(&mut self, list: &ShoppingList) -> Result<ShoppingList, RepositoryError> {
        let state = &mut self.working;
        if list.deleted_at.is_none() && list_name_taken(state, list.owner_id, &list.name, Some(list.id))
        {
            return Err(RepositoryError::Conflict("list name already exists".to_owned()));
        }

        let stored = state.lists.get_mut(&list.id).ok_or(RepositoryError::NotFound)?;
        let shared_with = std::mem::take(&mut stored.shared_with);
        *stored = ShoppingList {
            shared_with,
            updated_at: Utc::now(),
            ..list.clone()
        };
        Ok(stored.clone())
    }

    async fn add_list_share(
        &mut self,
        id: ListId,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        let list = self
            .working
            .lists
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if let Err(pos) = list.shared_with.binary_search(&user_id) {
            list.shared_with.insert(pos, user_id);
        }
        Ok(())
    }

    async fn remove_list_share(
        &mut self,
        id: ListId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let list = self
            .working
            .lists
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        let before = list.shared_with.len();
        list.shared_with.retain(|u| *u != user_id);
        Ok(list.shared_with.len() != before)
    }
}

#[async_trait]
impl ListItemRepository for MemoryUnitOfWork {
    async fn insert_list_item(&mut self, item: NewListItem) -> Result<ListItem, RepositoryError> {
        let state = &mut self.working;
        if list_product_taken(state, item.list_id, item.product_id, None) {
            return Err(RepositoryError::Conflict(
                "product is already on this list".to_owned(),
            ));
        }

        let now = Utc::now();
        let item = ListItem {
            id: ListItemId::new(state.next_id()),
            list_id: item.list_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit: item.unit,
            purchased: false,
            last_purchased_at: None,
            owner_id: item.owner_id,
            metadata: item.metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.list_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_list_item(
        &mut self,
        list_id: ListId,
        id: ListItemId,
    ) -> Result<Option<ListItem>, RepositoryError> {
        Ok(self
            .working
            .list_items
            .get(&id)
            .filter(|i| i.list_id == list_id && live(i.deleted_at.as_ref()))
            .cloned())
    }

    async fn list_items(&mut self, list_id: ListId) -> Result<Vec<ListItem>, RepositoryError> {
        let mut items: Vec<ListItem> = self
            .working
            .list_items
            .values()
            .filter(|i| i.list_id == list_id && live(i.deleted_at.as_ref()))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn save_list_item(&mut self, item: &ListItem) -> Result<ListItem, RepositoryError> {
        let state = &mut self.working;
        if item.deleted_at.is_none()
            && list_product_taken(state, item.list_id, item.product_id, Some(item.id))
        {
            return Err(RepositoryError::Conflict(
                "product is already on this list".to_owned(),
            ));
        }

        let stored = state
            .list_items
            .get_mut(&item.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = ListItem {
            updated_at: Utc::now(),
            ..item.clone()
        };
        Ok(stored.clone())
    }
}

// =============================================================================
// Pantries
// =============================================================================

fn pantry_name_taken(
    state: &MemoryState,
    owner: UserId,
    name: &str,
    except: Option<PantryId>,
) -> bool {
    state.pantries.values().any(|p| {
        Some(p.id) != except && live(p.deleted_at.as_ref()) && p.owner_id == owner && p.name == name
    })
}

#[async_trait]
impl PantryRepository for MemoryUnitOfWork {
    async fn insert_pantry(&mut self, pantry: NewPantry) -> Result<Pantry, RepositoryError> {
        let state = &mut self.working;
        if pantry_name_taken(state, pantry.owner_id, &pantry.name, None) {
            return Err(RepositoryError::Conflict("pantry name already exists".to_owned()));
        }

        let now = Utc::now();
        let pantry = Pantry {
            id: PantryId::new(state.next_id()),
            name: pantry.name,
            description: pantry.description,
            owner_id: pantry.owner_id,
            shared_with: Vec::new(),
            metadata: pantry.metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.pantries.insert(pantry.id, pantry.clone());
        Ok(pantry)
    }

    async fn find_pantry(&mut self, id: PantryId) -> Result<Option<Pantry>, RepositoryError> {
        Ok(self
            .working
            .pantries
            .get(&id)
            .filter(|p| live(p.deleted_at.as_ref()))
            .cloned())
    }

    async fn save_pantry(&mut self, pantry: &Pantry) -> Result<Pantry, RepositoryError> {
        let state = &mut self.working;
        if pantry.deleted_at.is_none()
            && pantry_name_taken(state, pantry.owner_id, &pantry.name, Some(pantry.id))
        {
            return Err(RepositoryError::Conflict("pantry name already exists".to_owned()));
        }

        let stored = state
            .pantries
            .get_mut(&pantry.id)
            .ok_or(RepositoryError::NotFound)?;
        let shared_with = std::mem::take(&mut stored.shared_with);
        *stored = Pantry {
            shared_with,
            updated_at: Utc::now(),
            ..pantry.clone()
        };
        Ok(stored.clone())
    }

    async fn add_pantry_share(
        &mut self,
        id: PantryId,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        let pantry = self
            .working
            .pantries
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if let Err(pos) = pantry.shared_with.binary_search(&user_id) {
            pantry.shared_with.insert(pos, user_id);
        }
        Ok(())
    }

    async fn remove_pantry_share(
        &mut self,
        id: PantryId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let pantry = self
            .working
            .pantries
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        let before = pantry.shared_with.len();
        pantry.shared_with.retain(|u| *u != user_id);
        Ok(pantry.shared_with.len() != before)
    }
}

#[async_trait]
impl PantryItemRepository for MemoryUnitOfWork {
    async fn insert_pantry_item(
        &mut self,
        item: NewPantryItem,
    ) -> Result<PantryItem, RepositoryError> {
        let state = &mut self.working;
        if state.pantry_items.values().any(|i| {
            live(i.deleted_at.as_ref()) && i.pantry_id == item.pantry_id && i.product_id == item.product_id
        }) {
            return Err(RepositoryError::Conflict(
                "product is already in this pantry".to_owned(),
            ));
        }

        let now = Utc::now();
        let item = PantryItem {
            id: PantryItemId::new(state.next_id()),
            pantry_id: item.pantry_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit: item.unit,
            expiration_date: item.expiration_date,
            owner_id: item.owner_id,
            added_at: item.added_at,
            metadata: item.metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.pantry_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_pantry_item(
        &mut self,
        pantry_id: PantryId,
        id: PantryItemId,
    ) -> Result<Option<PantryItem>, RepositoryError> {
        Ok(self
            .working
            .pantry_items
            .get(&id)
            .filter(|i| i.pantry_id == pantry_id && live(i.deleted_at.as_ref()))
            .cloned())
    }

    async fn find_pantry_item_by_product(
        &mut self,
        pantry_id: PantryId,
        product_id: ProductId,
    ) -> Result<Option<PantryItem>, RepositoryError> {
        Ok(self
            .working
            .pantry_items
            .values()
            .find(|i| {
                i.pantry_id == pantry_id
                    && i.product_id == product_id
                    && live(i.deleted_at.as_ref())
            })
            .cloned())
    }

    async fn pantry_items(
        &mut self,
        pantry_id: PantryId,
    ) -> Result<Vec<PantryItem>, RepositoryError> {
        let mut items: Vec<PantryItem> = self
            .working
            .pantry_items
            .values()
            .filter(|i| i.pantry_id == pantry_id && live(i.deleted_at.as_ref()))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn save_pantry_item(&mut self, item: &PantryItem) -> Result<PantryItem, RepositoryError> {
        let stored = self
            .working
            .pantry_items
            .get_mut(&item.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = PantryItem {
            updated_at: Utc::now(),
            ..item.clone()
        };
        Ok(stored.clone())
    }
}

// =============================================================================
// Purchases
// =============================================================================

#[async_trait]
impl PurchaseRepository for MemoryUnitOfWork {
    async fn insert_purchase(
        &mut self,
        purchase: NewPurchase,
    ) -> Result<Purchase, RepositoryError> {
        let state = &mut self.working;
        let now = Utc::now();
        let id = PurchaseId::new(state.next_id());

        let items = purchase
            .items
            .into_iter()
            .map(|item| PurchaseItem {
                id: PurchaseItemId::new(state.next_id()),
                purchase_id: id,
                list_item_id: item.list_item_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit: item.unit,
                metadata: item.metadata,
                purchased_at: item.purchased_at,
            })
            .collect();

        let purchase = Purchase {
            id,
            list_id: purchase.list_id,
            owner_id: purchase.owner_id,
            items,
            metadata: purchase.metadata,
            restored_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.purchases.insert(id, purchase.clone());
        Ok(purchase)
    }

    async fn find_purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, RepositoryError> {
        Ok(self
            .working
            .purchases
            .get(&id)
            .filter(|p| live(p.deleted_at.as_ref()))
            .cloned())
    }

    async fn save_purchase(&mut self, purchase: &Purchase) -> Result<Purchase, RepositoryError> {
        let stored = self
            .working
            .purchases
            .get_mut(&purchase.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.list_id = purchase.list_id;
        stored.metadata = purchase.metadata.clone();
        stored.restored_at = purchase.restored_at;
        stored.deleted_at = purchase.deleted_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Directed comparison where `None` sorts last in both directions.
fn cmp_nullable<V: Ord>(a: Option<V>, b: Option<V>, order: SortOrder) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => order.apply(a.cmp(&b)),
    }
}

fn matches_search(name: Option<&str>, search: Option<&String>) -> bool {
    search.is_none_or(|needle| name.is_some_and(|n| n.to_lowercase().contains(needle.as_str())))
}

fn visible(owner_id: UserId, shared_with: &[UserId], filter: &ShareableFilter) -> bool {
    let mine = owner_id == filter.user_id;
    let shared = shared_with.contains(&filter.user_id);
    match filter.ownership {
        Ownership::All => mine || shared,
        Ownership::Mine => mine,
        Ownership::SharedWithMe => shared,
    }
}

#[async_trait]
impl Queries for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn page_categories(
        &self,
        listing: &Listing<CategoryFilter, CategorySort>,
    ) -> Result<Page<Category>, RepositoryError> {
        let state = self.state.lock().await;
        let filter = &listing.filter;
        let order = listing.sort.order;

        let mut rows: Vec<Category> = state
            .categories
            .values()
            .filter(|c| live(c.deleted_at.as_ref()) && c.owner_id == filter.owner_id)
            .filter(|c| matches_search(Some(c.name.as_str()), filter.search.as_ref()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match listing.sort.field {
                CategorySort::Name => a.name.cmp(&b.name),
                CategorySort::CreatedAt => a.created_at.cmp(&b.created_at),
                CategorySort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            order.apply(ordering).then(a.id.cmp(&b.id))
        });

        Ok(listing.page.slice(rows))
    }

    async fn page_products(
        &self,
        listing: &Listing<ProductFilter, ProductSort>,
    ) -> Result<Page<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let filter = &listing.filter;
        let order = listing.sort.order;

        let mut rows: Vec<Product> = state
            .products
            .values()
            .filter(|p| live(p.deleted_at.as_ref()) && p.owner_id == filter.owner_id)
            .filter(|p| matches_search(Some(p.name.as_str()), filter.search.as_ref()))
            .filter(|p| filter.category_id.is_none() || p.category_id == filter.category_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match listing.sort.field {
                ProductSort::Name => a.name.cmp(&b.name),
                ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
                ProductSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            order.apply(ordering).then(a.id.cmp(&b.id))
        });

        Ok(listing.page.slice(rows))
    }

    async fn page_lists(
        &self,
        listing: &Listing<ShareableFilter, ListSort>,
    ) -> Result<Page<ShoppingList>, RepositoryError> {
        let state = self.state.lock().await;
        let filter = &listing.filter;
        let order = listing.sort.order;

        let mut rows: Vec<ShoppingList> = state
            .lists
            .values()
            .filter(|l| live(l.deleted_at.as_ref()) && visible(l.owner_id, &l.shared_with, filter))
            .filter(|l| matches_search(Some(l.name.as_str()), filter.search.as_ref()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match listing.sort.field {
                ListSort::Name => order.apply(a.name.cmp(&b.name)),
                ListSort::CreatedAt => order.apply(a.created_at.cmp(&b.created_at)),
                ListSort::UpdatedAt => order.apply(a.updated_at.cmp(&b.updated_at)),
                ListSort::LastPurchasedAt => {
                    cmp_nullable(a.last_purchased_at, b.last_purchased_at, order)
                }
            };
            ordering.then(a.id.cmp(&b.id))
        });

        Ok(listing.page.slice(rows))
    }

    async fn page_list_items(
        &self,
        listing: &Listing<ListItemFilter, ListItemSort>,
    ) -> Result<Page<ListItem>, RepositoryError> {
        let state = self.state.lock().await;
        let filter = &listing.filter;
        let order = listing.sort.order;

        let mut rows: Vec<ListItem> = state
            .list_items
            .values()
            .filter(|i| live(i.deleted_at.as_ref()) && i.list_id == filter.list_id)
            .filter(|i| matches_search(state.product_name(i.product_id), filter.search.as_ref()))
            .filter(|i| filter.purchased.is_none_or(|p| i.purchased == p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match listing.sort.field {
                ListItemSort::CreatedAt => a.created_at.cmp(&b.created_at),
                ListItemSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                ListItemSort::Quantity => a.quantity.cmp(&b.quantity),
            };
            order.apply(ordering).then(a.id.cmp(&b.id))
        });

        Ok(listing.page.slice(rows))
    }

    async fn page_pantries(
        &self,
        listing: &Listing<ShareableFilter, PantrySort>,
    ) -> Result<Page<Pantry>, RepositoryError> {
        let state = self.state.lock().await;
        let filter = &listing.filter;
        let order = listing.sort.order;

        let mut rows: Vec<Pantry> = state
            .pantries
            .values()
            .filter(|p| live(p.deleted_at.as_ref()) && visible(p.owner_id, &p.shared_with, filter))
            .filter(|p| matches_search(Some(p.name.as_str()), filter.search.as_ref()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match listing.sort.field {
                PantrySort::Name => a.name.cmp(&b.name),
                PantrySort::CreatedAt => a.created_at.cmp(&b.created_at),
                PantrySort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            order.apply(ordering).then(a.id.cmp(&b.id))
        });

        Ok(listing.page.slice(rows))
    }

    async fn page_pantry_items(
        &self,
        listing: &Listing<PantryItemFilter, PantryItemSort>,
    ) -> Result<Page<PantryItem>, RepositoryError> {
        let state = self.state.lock().await;
        let filter = &listing.filter;
        let order = listing.sort.order;

        let mut rows: Vec<PantryItem> = state
            .pantry_items
            .values()
            .filter(|i| live(i.deleted_at.as_ref()) && i.pantry_id == filter.pantry_id)
            .filter(|i| matches_search(state.product_name(i.product_id), filter.search.as_ref()))
            .filter(|i| {
                filter.category_id.is_none()
                    || state
                        .products
                        .get(&i.product_id)
                        .is_some_and(|p| p.category_id == filter.category_id)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match listing.sort.field {
                PantryItemSort::AddedAt => order.apply(a.added_at.cmp(&b.added_at)),
                PantryItemSort::ExpirationDate => {
                    cmp_nullable(a.expiration_date, b.expiration_date, order)
                }
                PantryItemSort::Quantity => order.apply(a.quantity.cmp(&b.quantity)),
                PantryItemSort::CreatedAt => order.apply(a.created_at.cmp(&b.created_at)),
            };
            ordering.then(a.id.cmp(&b.id))
        });

        Ok(listing.page.slice(rows))
    }

    async fn page_purchases(
        &self,
        listing: &Listing<UserId, PurchaseSort>,
    ) -> Result<Page<Purchase>, RepositoryError> {
        let state = self.state.lock().await;
        let order = listing.sort.order;

        let mut rows: Vec<Purchase> = state
            .purchases
            .values()
            .filter(|p| live(p.deleted_at.as_ref()) && p.owner_id == listing.filter)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match listing.sort.field {
                PurchaseSort::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            order.apply(ordering).then(a.id.cmp(&b.id))
        });

        Ok(listing.page.slice(rows))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use larder_core::{Metadata, Quantity};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: Email::parse(email).unwrap(),
            password_hash: "hash".to_owned(),
            display_name: "Test".to_owned(),
            email_verified: true,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_work_is_discarded() {
        let store = MemoryStore::new();

        let mut uow = store.begin().await.unwrap();
        uow.insert_user(new_user("a@example.com")).await.unwrap();
        drop(uow);

        let mut uow = store.begin().await.unwrap();
        let email = Email::parse("a@example.com").unwrap();
        assert!(uow.find_user_by_email(&email).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committed_work_is_visible() {
        let store = MemoryStore::new();

        let mut uow = store.begin().await.unwrap();
        let user = uow.insert_user(new_user("a@example.com")).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert!(uow.find_user(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_live_uniqueness_ignores_deleted_rows() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let user = uow.insert_user(new_user("a@example.com")).await.unwrap();

        let new_list = || NewList {
            name: "Groceries".to_owned(),
            description: None,
            recurring: false,
            owner_id: user.id,
            metadata: Metadata::new(),
        };

        let mut list = uow.insert_list(new_list()).await.unwrap();
        assert!(matches!(
            uow.insert_list(new_list()).await,
            Err(RepositoryError::Conflict(_))
        ));

        list.deleted_at = Some(Utc::now());
        uow.save_list(&list).await.unwrap();
        assert!(uow.insert_list(new_list()).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_list_product_conflicts() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let user = uow.insert_user(new_user("a@example.com")).await.unwrap();
        let list = uow
            .insert_list(NewList {
                name: "Weekly".to_owned(),
                description: None,
                recurring: true,
                owner_id: user.id,
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        let product = uow
            .insert_product(NewProduct {
                name: "Milk".to_owned(),
                description: None,
                unit: Some("l".to_owned()),
                default_quantity: Quantity::ONE,
                category_id: None,
                owner_id: user.id,
                metadata: Metadata::new(),
            })
            .await
            .unwrap();

        let new_item = || NewListItem {
            list_id: list.id,
            product_id: product.id,
            quantity: Quantity::ONE,
            unit: None,
            owner_id: user.id,
            metadata: Metadata::new(),
        };
        uow.insert_list_item(new_item()).await.unwrap();
        assert!(matches!(
            uow.insert_list_item(new_item()).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_shares_are_a_set() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let owner = uow.insert_user(new_user("owner@example.com")).await.unwrap();
        let friend = uow.insert_user(new_user("friend@example.com")).await.unwrap();
        let pantry = uow
            .insert_pantry(NewPantry {
                name: "Kitchen".to_owned(),
                description: None,
                owner_id: owner.id,
                metadata: Metadata::new(),
            })
            .await
            .unwrap();

        uow.add_pantry_share(pantry.id, friend.id).await.unwrap();
        uow.add_pantry_share(pantry.id, friend.id).await.unwrap();
        let pantry = uow.find_pantry(pantry.id).await.unwrap().unwrap();
        assert_eq!(pantry.shared_with, vec![friend.id]);

        assert!(uow.remove_pantry_share(pantry.id, friend.id).await.unwrap());
        assert!(!uow.remove_pantry_share(pantry.id, friend.id).await.unwrap());
    }

    #[test]
    fn test_nulls_sort_last_both_ways() {
        assert_eq!(cmp_nullable(None, Some(1), SortOrder::Asc), Ordering::Greater);
        assert_eq!(cmp_nullable(None, Some(1), SortOrder::Desc), Ordering::Greater);
        assert_eq!(cmp_nullable(Some(1), Some(2), SortOrder::Desc), Ordering::Greater);
    }
}
