use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::address::{Address, NewAddress};
use crate::domain::cart::{CartItem, CartWrite};
use crate::domain::catalog::{Category, NewCategory, NewProduct, Product, ProductFilter};
use crate::domain::ids::*;
use crate::domain::order::{NewOrder, NewOrderItem, Order, OrderEvent, OrderItem};
use crate::domain::promotion::{Banner, NewBanner};
use crate::domain::user::{NewUser, User};
use crate::events::EventEnvelope;

use super::{constraints, Store, StoreError, StoreResult, StoreTx};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// All tables live behind one async mutex. A transaction takes the owned
// guard, works on a staged copy, and swaps it in on commit; dropping the
// transaction discards the copy. Holding the guard serialises transactions,
// which is what the row locks of the PostgreSQL store achieve per row.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sequences: BTreeMap<&'static str, i64>,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    addresses: BTreeMap<AddressId, Address>,
    banners: BTreeMap<BannerId, Banner>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: BTreeMap<OrderItemId, OrderItem>,
    order_events: Vec<EventEnvelope<OrderEvent>>,
}

impl MemoryState {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn clear_other_defaults(&mut self, address: &Address) {
        if !address.is_default {
            return;
        }
        for other in self.addresses.values_mut() {
            if other.user_id == address.user_id && other.id != address.id {
                other.is_default = false;
            }
        }
    }

    fn cart_items(&self, user_id: UserId) -> Vec<CartItem> {
        self.cart_items
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect()
    }

    fn clear_cart(&mut self, user_id: UserId) -> u64 {
        let before = self.cart_items.len();
        self.cart_items.retain(|_, i| i.user_id != user_id);
        (before - self.cart_items.len()) as u64
    }

    fn order_items(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect()
    }

    fn product_mut(&mut self, id: ProductId) -> StoreResult<&mut Product> {
        self.products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // ========================================================================
    // Users
    // ========================================================================

    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::duplicate(constraints::USER_EMAIL));
        }

        let user = User {
            id: UserId::new(state.next_id("users")),
            email: user.email,
            name: user.name,
            phone: user.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    // ========================================================================
    // Categories
    // ========================================================================

    async fn insert_category(&self, category: NewCategory, now: DateTime<Utc>) -> StoreResult<Category> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::duplicate(constraints::CATEGORY_NAME));
        }

        let category = Category {
            id: CategoryId::new(state.next_id("categories")),
            name: category.name,
            description: category.description,
            icon_name: category.icon_name,
            is_active: true,
            sort_order: category.sort_order,
            created_at: now,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn save_category(&self, category: &Category) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state
            .categories
            .values()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(StoreError::duplicate(constraints::CATEGORY_NAME));
        }
        let slot = state
            .categories
            .get_mut(&category.id)
            .ok_or_else(|| StoreError::not_found("category", category.id))?;
        *slot = category.clone();
        Ok(())
    }

    async fn list_categories(&self, active_only: bool) -> StoreResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state
            .categories
            .values()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect();
        categories.sort_by_key(|c| (c.sort_order, c.id));
        Ok(categories)
    }

    // ========================================================================
    // Products
    // ========================================================================

    async fn insert_product(&self, product: NewProduct, now: DateTime<Utc>) -> StoreResult<Product> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::duplicate(constraints::PRODUCT_SKU));
        }

        let product = Product {
            id: ProductId::new(state.next_id("products")),
            name: product.name,
            description: product.description,
            price: product.price,
            original_price: product.original_price,
            stock_quantity: product.stock_quantity,
            brand: product.brand,
            model: product.model,
            sku: product.sku,
            weight: product.weight,
            dimensions: product.dimensions,
            specifications: product.specifications,
            images: product.images,
            rating: None,
            review_count: 0,
            is_featured: product.is_featured,
            is_active: true,
            category_id: product.category_id,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
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
        let mut state = self.state.lock().await;
        let address = Address {
            id: AddressId::new(state.next_id("addresses")),
            user_id,
            label: address.label,
            recipient_name: address.recipient_name,
            phone: address.phone,
            address_line_1: address.address_line_1,
            address_line_2: address.address_line_2,
            city: address.city,
            province: address.province,
            postal_code: address.postal_code,
            is_default: address.is_default,
            created_at: now,
            updated_at: now,
        };
        state.clear_other_defaults(&address);
        state.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn get_address(&self, id: AddressId) -> StoreResult<Option<Address>> {
        Ok(self.state.lock().await.addresses.get(&id).cloned())
    }

    async fn save_address(&self, address: &Address) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .addresses
            .get_mut(&address.id)
            .ok_or_else(|| StoreError::not_found("address", address.id))?;
        *slot = address.clone();
        state.clear_other_defaults(address);
        Ok(())
    }

    async fn list_addresses(&self, user_id: UserId) -> StoreResult<Vec<Address>> {
        let state = self.state.lock().await;
        Ok(state
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    // ========================================================================
    // Banners
    // ========================================================================

    async fn insert_banner(&self, banner: NewBanner, now: DateTime<Utc>) -> StoreResult<Banner> {
        let mut state = self.state.lock().await;
        let banner = Banner {
            id: BannerId::new(state.next_id("banners")),
            title: banner.title,
            subtitle: banner.subtitle,
            image_url: banner.image_url,
            link_url: banner.link_url,
            is_active: true,
            sort_order: banner.sort_order,
            start_date: banner.start_date,
            end_date: banner.end_date,
            created_at: now,
        };
        state.banners.insert(banner.id, banner.clone());
        Ok(banner)
    }

    async fn get_banner(&self, id: BannerId) -> StoreResult<Option<Banner>> {
        Ok(self.state.lock().await.banners.get(&id).cloned())
    }

    async fn save_banner(&self, banner: &Banner) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .banners
            .get_mut(&banner.id)
            .ok_or_else(|| StoreError::not_found("banner", banner.id))?;
        *slot = banner.clone();
        Ok(())
    }

    async fn list_banners(&self, active_only: bool) -> StoreResult<Vec<Banner>> {
        let state = self.state.lock().await;
        let mut banners: Vec<Banner> = state
            .banners
            .values()
            .filter(|b| !active_only || b.is_active)
            .cloned()
            .collect();
        banners.sort_by_key(|b| (b.sort_order, b.id));
        Ok(banners)
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
        let mut state = self.state.lock().await;

        if let Some(item) = state
            .cart_items
            .values_mut()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
        {
            item.quantity = mode.merge(item.quantity, quantity);
            item.updated_at = now;
            return Ok(item.clone());
        }

        let item = CartItem {
            id: CartItemId::new(state.next_id("cart_items")),
            user_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        state.cart_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn cart_items(&self, user_id: UserId) -> StoreResult<Vec<CartItem>> {
        Ok(self.state.lock().await.cart_items(user_id))
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.cart_items.len();
        state
            .cart_items
            .retain(|_, i| !(i.user_id == user_id && i.product_id == product_id));
        Ok(state.cart_items.len() < before)
    }

    async fn clear_cart(&self, user_id: UserId) -> StoreResult<u64> {
        Ok(self.state.lock().await.clear_cart(user_id))
    }

    // ========================================================================
    // Orders
    // ========================================================================

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        Ok(self.state.lock().await.order_items(id))
    }

    async fn list_orders(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn order_events(&self, id: OrderId) -> StoreResult<Vec<EventEnvelope<OrderEvent>>> {
        let state = self.state.lock().await;
        let mut events: Vec<_> = state
            .order_events
            .iter()
            .filter(|e| e.aggregate_id == id.as_i64())
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence_number);
        Ok(events)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

// ============================================================================
// Transaction
// ============================================================================

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn save_user(&mut self, user: &User) -> StoreResult<()> {
        if self
            .staged
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::duplicate(constraints::USER_EMAIL));
        }
        let slot = self
            .staged
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::not_found("user", user.id))?;
        *slot = user.clone();
        Ok(())
    }

    async fn lock_cart(&mut self, user_id: UserId) -> StoreResult<Vec<CartItem>> {
        Ok(self.staged.cart_items(user_id))
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.products.get(id).cloned())
            .collect())
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<i32>> {
        let product = self.staged.product_mut(id)?;
        if product.stock_quantity < quantity {
            return Ok(None);
        }
        product.stock_quantity -= quantity;
        product.updated_at = now;
        Ok(Some(product.stock_quantity))
    }

    async fn increment_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<i32> {
        let product = self.staged.product_mut(id)?;
        product.stock_quantity = product.stock_quantity.saturating_add(quantity);
        product.updated_at = now;
        Ok(product.stock_quantity)
    }

    async fn set_stock(&mut self, id: ProductId, quantity: i32, now: DateTime<Utc>) -> StoreResult<()> {
        let product = self.staged.product_mut(id)?;
        product.stock_quantity = quantity;
        product.updated_at = now;
        Ok(())
    }

    async fn save_product(&mut self, product: &Product) -> StoreResult<()> {
        if self
            .staged
            .products
            .values()
            .any(|p| p.id != product.id && p.sku == product.sku)
        {
            return Err(StoreError::duplicate(constraints::PRODUCT_SKU));
        }
        let slot = self.staged.product_mut(product.id)?;
        let stock_quantity = slot.stock_quantity;
        *slot = Product {
            stock_quantity,
            ..product.clone()
        };
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        if self
            .staged
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::duplicate(constraints::ORDER_NUMBER));
        }
        let order = order.into_order(OrderId::new(self.staged.next_id("orders")));
        self.staged.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<Vec<OrderItem>> {
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let item = item.into_item(OrderItemId::new(self.staged.next_id("order_items")), order_id);
            self.staged.order_items.insert(item.id, item.clone());
            inserted.push(item);
        }
        Ok(inserted)
    }

    async fn remove_cart_items(&mut self, ids: &[CartItemId]) -> StoreResult<u64> {
        let before = self.staged.cart_items.len();
        self.staged.cart_items.retain(|id, _| !ids.contains(id));
        Ok((before - self.staged.cart_items.len()) as u64)
    }

    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn order_items(&mut self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        Ok(self.staged.order_items(id))
    }

    async fn save_order(&mut self, order: &Order) -> StoreResult<()> {
        let slot = self
            .staged
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::not_found("order", order.id))?;
        *slot = order.clone();
        Ok(())
    }

    async fn append_order_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> StoreResult<()> {
        self.staged.order_events.extend_from_slice(events);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::keyboard;
    use chrono::Utc;

    async fn seeded() -> (MemoryStore, Product) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let category = store
            .insert_category(
                NewCategory {
                    name: "Peripherals".to_string(),
                    description: None,
                    icon_name: "keyboard".to_string(),
                    sort_order: 0,
                },
                now,
            )
            .await
            .unwrap();
        let product = store.insert_product(keyboard(category.id), now).await.unwrap();
        (store, product)
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let (store, product) = seeded().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.decrement_stock(product.id, 5, Utc::now()).await.unwrap();
        }

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, product.stock_quantity);
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let (store, product) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let left = tx.decrement_stock(product.id, 5, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(left, Some(product.stock_quantity - 5));
        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, product.stock_quantity - 5);
    }

    #[tokio::test]
    async fn test_decrement_refuses_to_go_negative() {
        let (store, product) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let result = tx
            .decrement_stock(product.id, product.stock_quantity + 1, Utc::now())
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(matches!(
            tx.decrement_stock(ProductId::new(999), 1, Utc::now()).await,
            Err(StoreError::NotFound { entity: "product", .. })
        ));
    }

    #[tokio::test]
    async fn test_lock_products_sorted_and_skips_missing() {
        let (store, product) = seeded().await;
        let mut second = keyboard(product.category_id);
        second.sku = "KB-2".to_string();
        let second = store.insert_product(second, Utc::now()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let locked = tx
            .lock_products(&[second.id, ProductId::new(999), product.id])
            .await
            .unwrap();

        let ids: Vec<_> = locked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![product.id, second.id]);
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let (store, product) = seeded().await;
        let err = store
            .insert_product(keyboard(product.category_id), Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_duplicate(constraints::PRODUCT_SKU));
    }

    #[tokio::test]
    async fn test_save_product_keeps_committed_stock() {
        let (store, product) = seeded().await;
        let stale = store.get_product(product.id).await.unwrap().unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.decrement_stock(product.id, 3, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.save_product(&Product {
            name: "Renamed".to_string(),
            ..stale
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.stock_quantity, product.stock_quantity - 3);
    }

    #[tokio::test]
    async fn test_set_stock_is_absolute() {
        let (store, product) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.set_stock(product.id, 7, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock_quantity, 7);
    }

    #[tokio::test]
    async fn test_remove_cart_items_spares_unlisted_lines() {
        let (store, product) = seeded().await;
        let mut other = keyboard(product.category_id);
        other.sku = "KB-2".to_string();
        let other = store.insert_product(other, Utc::now()).await.unwrap();
        let user = store
            .insert_user(
                NewUser {
                    email: "cart@example.com".to_string(),
                    name: "Cart".to_string(),
                    phone: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let first = store
            .upsert_cart_item(user.id, product.id, 1, CartWrite::Add, Utc::now())
            .await
            .unwrap();
        store
            .upsert_cart_item(user.id, other.id, 2, CartWrite::Add, Utc::now())
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let removed = tx.remove_cart_items(&[first.id]).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(removed, 1);
        let left = store.cart_items(user.id).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].product_id, other.id);
    }
}
