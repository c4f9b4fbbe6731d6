// ============================================================================
// Storage Layer
// ============================================================================
//
// `Store` covers plain record storage plus `begin()`, which opens a
// `StoreTx`. Everything done through one `StoreTx` becomes visible together
// on `commit`; dropping it without committing discards all of it.
//
// Two implementations:
// - MemoryStore: a single mutex-guarded state (tests, demos)
// - PgStore: PostgreSQL through sqlx with row locks
//
// ============================================================================

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::address::{Address, NewAddress};
use crate::domain::cart::{CartItem, CartWrite};
use crate::domain::catalog::{Category, NewCategory, NewProduct, Product, ProductFilter};
use crate::domain::ids::{AddressId, BannerId, CartItemId, CategoryId, OrderId, ProductId, UserId};
use crate::domain::order::{NewOrder, NewOrderItem, Order, OrderEvent, OrderItem};
use crate::domain::promotion::{Banner, NewBanner};
use crate::domain::user::{NewUser, User};
use crate::events::EventEnvelope;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Unique constraint names shared by both implementations.
pub mod constraints {
    pub const USER_EMAIL: &str = "users_email_key";
    pub const CATEGORY_NAME: &str = "categories_name_key";
    pub const PRODUCT_SKU: &str = "products_sku_key";
    pub const ORDER_NUMBER: &str = "orders_order_number_key";
    pub const CART_LINE: &str = "cart_items_user_product_key";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Duplicate value violates unique constraint {constraint}")]
    Duplicate { constraint: String },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn duplicate(constraint: &str) -> Self {
        Self::Duplicate {
            constraint: constraint.to_string(),
        }
    }

    pub fn is_duplicate(&self, constraint: &str) -> bool {
        matches!(self, Self::Duplicate { constraint: c } if c == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Duplicate {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        Self::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> StoreResult<User>;
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    // Categories
    async fn insert_category(&self, category: NewCategory, now: DateTime<Utc>) -> StoreResult<Category>;
    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;
    async fn save_category(&self, category: &Category) -> StoreResult<()>;
    async fn list_categories(&self, active_only: bool) -> StoreResult<Vec<Category>>;

    // Products
    async fn insert_product(&self, product: NewProduct, now: DateTime<Utc>) -> StoreResult<Product>;
    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>>;
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

    // Addresses. Writing a default address clears the flag on the owner's
    // other addresses in the same operation.
    async fn insert_address(
        &self,
        user_id: UserId,
        address: NewAddress,
        now: DateTime<Utc>,
    ) -> StoreResult<Address>;
    async fn get_address(&self, id: AddressId) -> StoreResult<Option<Address>>;
    async fn save_address(&self, address: &Address) -> StoreResult<()>;
    async fn list_addresses(&self, user_id: UserId) -> StoreResult<Vec<Address>>;

    // Banners
    async fn insert_banner(&self, banner: NewBanner, now: DateTime<Utc>) -> StoreResult<Banner>;
    async fn get_banner(&self, id: BannerId) -> StoreResult<Option<Banner>>;
    async fn save_banner(&self, banner: &Banner) -> StoreResult<()>;
    async fn list_banners(&self, active_only: bool) -> StoreResult<Vec<Banner>>;

    // Cart
    async fn upsert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        mode: CartWrite,
        now: DateTime<Utc>,
    ) -> StoreResult<CartItem>;
    async fn cart_items(&self, user_id: UserId) -> StoreResult<Vec<CartItem>>;
    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> StoreResult<bool>;
    async fn clear_cart(&self, user_id: UserId) -> StoreResult<u64>;

    // Orders (read side; writes go through StoreTx)
    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>>;
    async fn list_orders(&self, user_id: UserId) -> StoreResult<Vec<Order>>;
    async fn order_events(&self, id: OrderId) -> StoreResult<Vec<EventEnvelope<OrderEvent>>>;

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// Read-modify-write of users and products goes through a `StoreTx` so a
/// concurrent checkout or edit is never overwritten with a stale row.
#[async_trait]
pub trait StoreTx: Send {
    async fn lock_user(&mut self, id: UserId) -> StoreResult<Option<User>>;
    async fn save_user(&mut self, user: &User) -> StoreResult<()>;

    /// Cart lines for a user, locked until the transaction ends.
    async fn lock_cart(&mut self, user_id: UserId) -> StoreResult<Vec<CartItem>>;

    /// Products locked in ascending id order. Missing ids are skipped.
    async fn lock_products(&mut self, ids: &[ProductId]) -> StoreResult<Vec<Product>>;

    /// Decrement-if-available. Returns the new stock, or `None` when the
    /// product holds fewer than `quantity` units.
    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<i32>>;

    async fn increment_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<i32>;

    /// Explicit stock correction to an absolute level.
    async fn set_stock(&mut self, id: ProductId, quantity: i32, now: DateTime<Utc>) -> StoreResult<()>;

    /// Writes every catalog field except `stock_quantity`, which only moves
    /// through the stock operations above.
    async fn save_product(&mut self, product: &Product) -> StoreResult<()>;

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order>;
    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<Vec<OrderItem>>;
    /// Deletes exactly the given cart lines; lines added after `lock_cart`
    /// survive.
    async fn remove_cart_items(&mut self, ids: &[CartItemId]) -> StoreResult<u64>;

    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn order_items(&mut self, id: OrderId) -> StoreResult<Vec<OrderItem>>;
    async fn save_order(&mut self, order: &Order) -> StoreResult<()>;
    async fn append_order_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
