use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::address::{Address, NewAddress};
use crate::domain::cart::{CartItem, CartWrite};
use crate::domain::catalog::{Category, NewCategory, NewProduct, Product, ProductFilter};
use crate::domain::ids::*;
use crate::domain::order::{NewOrder, NewOrderItem, Order, OrderEvent, OrderItem};
use crate::domain::promotion::{Banner, NewBanner};
use crate::domain::user::{NewUser, User};
use crate::events::EventEnvelope;

use super::{Store, StoreError, StoreResult, StoreTx};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Checkout concurrency relies on row locks: the cart and the products are
// read with `FOR UPDATE` (products in ascending id order), and the stock
// decrement is conditional on enough units remaining.
//
// ============================================================================

const USER_COLUMNS: &str = "id, email, name, phone, is_active, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, description, icon_name, is_active, sort_order, created_at";

const PRODUCT_COLUMNS: &str = "id, name, description, price, original_price, stock_quantity, \
     brand, model, sku, weight, dimensions, specifications, images, rating, review_count, \
     is_featured, is_active, category_id, created_at, updated_at";

const ADDRESS_COLUMNS: &str = "id, user_id, label, recipient_name, phone, address_line_1, \
     address_line_2, city, province, postal_code, is_default, created_at, updated_at";

const BANNER_COLUMNS: &str = "id, title, subtitle, image_url, link_url, is_active, sort_order, \
     start_date, end_date, created_at";

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, subtotal, shipping_cost, \
     tax_amount, discount_amount, total_amount, payment_method, payment_status, \
     shipping_address_id, notes, tracking_number, shipped_at, delivered_at, created_at, \
     updated_at, version";

const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price, total_price, product_snapshot";

const EVENT_COLUMNS: &str = "event_id, aggregate_id, sequence_number, event_type, event_version, \
     event_data, correlation_id, user_id, created_at";

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: i64,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    event_data: Json<OrderEvent>,
    correlation_id: Uuid,
    user_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for EventEnvelope<OrderEvent> {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            sequence_number: row.sequence_number,
            event_type: row.event_type,
            event_version: row.event_version,
            event_data: row.event_data.0,
            correlation_id: row.correlation_id,
            user_id: row.user_id,
            timestamp: row.created_at,
        }
    }
}

fn ensure_updated(rows: u64, entity: &'static str, id: i64) -> StoreResult<()> {
    if rows == 0 {
        return Err(StoreError::not_found(entity, id));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    // ========================================================================
    // Users
    // ========================================================================

    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (email, name, phone, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, TRUE, $4, $4) RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.phone)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // ========================================================================
    // Categories
    // ========================================================================

    async fn insert_category(&self, category: NewCategory, now: DateTime<Utc>) -> StoreResult<Category> {
        let sql = format!(
            "INSERT INTO categories (name, description, icon_name, is_active, sort_order, created_at) \
             VALUES ($1, $2, $3, TRUE, $4, $5) RETURNING {CATEGORY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(&category.name)
            .bind(&category.description)
            .bind(&category.icon_name)
            .bind(category.sort_order)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_category(&self, category: &Category) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE categories SET name = $2, description = $3, icon_name = $4, is_active = $5, \
             sort_order = $6 WHERE id = $1",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.icon_name)
        .bind(category.is_active)
        .bind(category.sort_order)
        .execute(&self.pool)
        .await?;
        ensure_updated(result.rows_affected(), "category", category.id.as_i64())
    }

    async fn list_categories(&self, active_only: bool) -> StoreResult<Vec<Category>> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE (NOT $1 OR is_active) \
             ORDER BY sort_order, id"
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?)
    }

    // ========================================================================
    // Products
    // ========================================================================

    async fn insert_product(&self, product: NewProduct, now: DateTime<Utc>) -> StoreResult<Product> {
        let sql = format!(
            "INSERT INTO products (name, description, price, original_price, stock_quantity, \
             brand, model, sku, weight, dimensions, specifications, images, review_count, \
             is_featured, is_active, category_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, $13, TRUE, $14, $15, $15) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.original_price)
            .bind(product.stock_quantity)
            .bind(&product.brand)
            .bind(&product.model)
            .bind(&product.sku)
            .bind(product.weight)
            .bind(&product.dimensions)
            .bind(Json(&product.specifications))
            .bind(&product.images)
            .bind(product.is_featured)
            .bind(product.category_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1::BIGINT IS NULL OR category_id = $1) \
               AND (NOT $2 OR is_active) \
               AND (NOT $3 OR is_featured) \
             ORDER BY id"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(filter.category_id)
            .bind(filter.active_only)
            .bind(filter.featured_only)
            .fetch_all(&self.pool)
            .await?)
    }

    // ========================================================================
    // Addresses
    // ========================================================================

    async fn insert_address(
        &self,
        user_id: UserId,
        address: NewAddress,
        now: DateTime<Utc>,
    ) -> StoreResult<Address> {
        let mut tx = self.pool.begin().await?;
        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let sql = format!(
            "INSERT INTO addresses (user_id, label, recipient_name, phone, address_line_1, \
             address_line_2, city, province, postal_code, is_default, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) RETURNING {ADDRESS_COLUMNS}"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .bind(&address.label)
            .bind(&address.recipient_name)
            .bind(&address.phone)
            .bind(&address.address_line_1)
            .bind(&address.address_line_2)
            .bind(&address.city)
            .bind(&address.province)
            .bind(&address.postal_code)
            .bind(address.is_default)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(address)
    }

    async fn get_address(&self, id: AddressId) -> StoreResult<Option<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1");
        Ok(sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_address(&self, address: &Address) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        if address.is_default {
            sqlx::query(
                "UPDATE addresses SET is_default = FALSE \
                 WHERE user_id = $1 AND id <> $2 AND is_default",
            )
            .bind(address.user_id)
            .bind(address.id)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            "UPDATE addresses SET label = $2, recipient_name = $3, phone = $4, \
             address_line_1 = $5, address_line_2 = $6, city = $7, province = $8, \
             postal_code = $9, is_default = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(address.id)
        .bind(&address.label)
        .bind(&address.recipient_name)
        .bind(&address.phone)
        .bind(&address.address_line_1)
        .bind(&address.address_line_2)
        .bind(&address.city)
        .bind(&address.province)
        .bind(&address.postal_code)
        .bind(address.is_default)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await?;
        ensure_updated(result.rows_affected(), "address", address.id.as_i64())?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_addresses(&self, user_id: UserId) -> StoreResult<Vec<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY id");
        Ok(sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    // ========================================================================
    // Banners
    // ========================================================================

    async fn insert_banner(&self, banner: NewBanner, now: DateTime<Utc>) -> StoreResult<Banner> {
        let sql = format!(
            "INSERT INTO banners (title, subtitle, image_url, link_url, is_active, sort_order, \
             start_date, end_date, created_at) \
             VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7, $8) RETURNING {BANNER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Banner>(&sql)
            .bind(&banner.title)
            .bind(&banner.subtitle)
            .bind(&banner.image_url)
            .bind(&banner.link_url)
            .bind(banner.sort_order)
            .bind(banner.start_date)
            .bind(banner.end_date)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_banner(&self, id: BannerId) -> StoreResult<Option<Banner>> {
        let sql = format!("SELECT {BANNER_COLUMNS} FROM banners WHERE id = $1");
        Ok(sqlx::query_as::<_, Banner>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_banner(&self, banner: &Banner) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE banners SET title = $2, subtitle = $3, image_url = $4, link_url = $5, \
             is_active = $6, sort_order = $7, start_date = $8, end_date = $9 WHERE id = $1",
        )
        .bind(banner.id)
        .bind(&banner.title)
        .bind(&banner.subtitle)
        .bind(&banner.image_url)
        .bind(&banner.link_url)
        .bind(banner.is_active)
        .bind(banner.sort_order)
        .bind(banner.start_date)
        .bind(banner.end_date)
        .execute(&self.pool)
        .await?;
        ensure_updated(result.rows_affected(), "banner", banner.id.as_i64())
    }

    async fn list_banners(&self, active_only: bool) -> StoreResult<Vec<Banner>> {
        let sql = format!(
            "SELECT {BANNER_COLUMNS} FROM banners WHERE (NOT $1 OR is_active) ORDER BY sort_order, id"
        );
        Ok(sqlx::query_as::<_, Banner>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?)
    }

    // ========================================================================
    // Cart
    // ========================================================================

    async fn upsert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        mode: CartWrite,
        now: DateTime<Utc>,
    ) -> StoreResult<CartItem> {
        let merged = match mode {
            CartWrite::Add => "LEAST(cart_items.quantity::BIGINT + EXCLUDED.quantity, 2147483647)::INT",
            CartWrite::Replace => "EXCLUDED.quantity",
        };
        let sql = format!(
            "INSERT INTO cart_items (user_id, product_id, quantity, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT ON CONSTRAINT cart_items_user_product_key \
             DO UPDATE SET quantity = {merged}, updated_at = EXCLUDED.updated_at \
             RETURNING {CART_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .bind(product_id)
            .bind(quantity)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn cart_items(&self, user_id: UserId) -> StoreResult<Vec<CartItem>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY id");
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: UserId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Orders
    // ========================================================================

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id");
        Ok(sqlx::query_as::<_, OrderItem>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_orders(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn order_events(&self, id: OrderId) -> StoreResult<Vec<EventEnvelope<OrderEvent>>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM order_events WHERE aggregate_id = $1 ORDER BY sequence_number"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id.as_i64())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(EventEnvelope::from).collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

// ============================================================================
// Transaction
// ============================================================================

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn save_user(&mut self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET email = $2, name = $3, phone = $4, is_active = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result.rows_affected(), "user", user.id.as_i64())
    }

    async fn lock_cart(&mut self, user_id: UserId) -> StoreResult<Vec<CartItem>> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY id FOR UPDATE"
        );
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<i32>> {
        Ok(sqlx::query_scalar::<_, i32>(
            "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = $3 \
             WHERE id = $1 AND stock_quantity >= $2 RETURNING stock_quantity",
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn increment_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = $3 \
             WHERE id = $1 RETURNING stock_quantity",
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn set_stock(&mut self, id: ProductId, quantity: i32, now: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result.rows_affected(), "product", id.as_i64())
    }

    async fn save_product(&mut self, product: &Product) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4, original_price = $5, \
             brand = $6, model = $7, sku = $8, weight = $9, dimensions = $10, \
             specifications = $11, images = $12, rating = $13, review_count = $14, \
             is_featured = $15, is_active = $16, category_id = $17, updated_at = $18 \
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.original_price)
        .bind(&product.brand)
        .bind(&product.model)
        .bind(&product.sku)
        .bind(product.weight)
        .bind(&product.dimensions)
        .bind(Json(&product.specifications))
        .bind(&product.images)
        .bind(product.rating)
        .bind(product.review_count)
        .bind(product.is_featured)
        .bind(product.is_active)
        .bind(product.category_id)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result.rows_affected(), "product", product.id.as_i64())
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let sql = format!(
            "INSERT INTO orders (order_number, user_id, status, subtotal, shipping_cost, \
             tax_amount, discount_amount, total_amount, payment_method, payment_status, \
             shipping_address_id, notes, created_at, updated_at, version) \
             VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, 'pending', $9, $10, $11, $11, 0) \
             RETURNING {ORDER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(&order.order_number)
            .bind(order.user_id)
            .bind(order.totals.subtotal)
            .bind(order.totals.shipping_cost)
            .bind(order.totals.tax_amount)
            .bind(order.totals.discount_amount)
            .bind(order.totals.total_amount)
            .bind(order.payment_method)
            .bind(order.shipping_address_id)
            .bind(&order.notes)
            .bind(order.created_at)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<Vec<OrderItem>> {
        let sql = format!(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, total_price, \
             product_snapshot) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ORDER_ITEM_COLUMNS}"
        );
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItem>(&sql)
                .bind(order_id)
                .bind(item.product_id)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(item.total_price)
                .bind(Json(&item.product_snapshot))
                .fetch_one(&mut *self.tx)
                .await?;
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn remove_cart_items(&mut self, ids: &[CartItemId]) -> StoreResult<u64> {
        let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn order_items(&mut self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id");
        Ok(sqlx::query_as::<_, OrderItem>(&sql)
            .bind(id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    /// Amounts are fixed at checkout and never rewritten here.
    async fn save_order(&mut self, order: &Order) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, tracking_number = $4, \
             shipped_at = $5, delivered_at = $6, updated_at = $7, version = $8 WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(&order.tracking_number)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .bind(order.version)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result.rows_affected(), "order", order.id.as_i64())
    }

    async fn append_order_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> StoreResult<()> {
        for event in events {
            sqlx::query(
                "INSERT INTO order_events (event_id, aggregate_id, sequence_number, event_type, \
                 event_version, event_data, correlation_id, user_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(event.event_id)
            .bind(event.aggregate_id)
            .bind(event.sequence_number)
            .bind(&event.event_type)
            .bind(event.event_version)
            .bind(Json(&event.event_data))
            .bind(event.correlation_id)
            .bind(event.user_id)
            .bind(event.timestamp)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
