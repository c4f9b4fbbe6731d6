//! Shared fixtures for the in-crate test suites.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use crate::clock::FixedClock;
use crate::domain::address::{Address, AddressService, NewAddress};
use crate::domain::cart::CartService;
use crate::domain::catalog::{CatalogService, Category, NewCategory, NewProduct, Product};
use crate::domain::ids::{CategoryId, ProductId};
use crate::domain::order::{
    CheckoutCart, OrderService, PricingError, PromotionEvaluator, ShippingCalculator,
    TaxCalculator,
};
use crate::domain::promotion::BannerService;
use crate::domain::user::{NewUser, User, UserService};
use crate::metrics::ShopMetrics;
use crate::store::{MemoryStore, Store};

pub(crate) struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub metrics: Arc<ShopMetrics>,
    pub users: UserService,
    pub catalog: CatalogService,
    pub addresses: AddressService,
    pub carts: CartService,
    pub banners: BannerService,
    pub orders: OrderService,
}

/// Services over a fresh in-memory store with the clock pinned to
/// 2024-03-01 09:00 UTC.
pub(crate) fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ));
    let metrics = Arc::new(ShopMetrics::new().unwrap());

    let dyn_store: Arc<dyn Store> = store.clone();
    Fixture {
        users: UserService::new(dyn_store.clone(), clock.clone()),
        catalog: CatalogService::new(dyn_store.clone(), clock.clone()),
        addresses: AddressService::new(dyn_store.clone(), clock.clone()),
        carts: CartService::new(dyn_store.clone(), clock.clone()),
        banners: BannerService::new(dyn_store.clone(), clock.clone()),
        orders: OrderService::new(dyn_store, clock.clone(), metrics.clone()),
        store,
        clock,
        metrics,
    }
}

impl Fixture {
    pub async fn category(&self, name: &str) -> Category {
        self.catalog
            .create_category(NewCategory {
                name: name.to_string(),
                description: None,
                icon_name: "tag".to_string(),
                sort_order: 0,
            })
            .await
            .unwrap()
    }

    pub async fn user(&self, email: &str) -> User {
        self.users
            .register(NewUser {
                email: email.to_string(),
                name: "Test Shopper".to_string(),
                phone: None,
            })
            .await
            .unwrap()
    }

    /// Active product in a category of its own.
    pub async fn product(&self, sku: &str, price: Decimal, stock: i32) -> Product {
        let category = self.category(&format!("Category {sku}")).await;
        self.catalog
            .create_product(NewProduct {
                name: format!("Product {sku}"),
                sku: sku.to_string(),
                price,
                stock_quantity: stock,
                images: vec![format!("https://cdn.example.com/{sku}.jpg")],
                ..keyboard(category.id)
            })
            .await
            .unwrap()
    }

    pub async fn stock(&self, id: ProductId) -> i32 {
        self.store
            .get_product(id)
            .await
            .unwrap()
            .map(|p| p.stock_quantity)
            .unwrap()
    }

    /// Order service sharing this fixture's store, clock and metrics with
    /// fixed pricing.
    pub fn orders_with(&self, shipping: Decimal, tax: Decimal, discount: Decimal) -> OrderService {
        self.orders
            .clone()
            .with_shipping(Arc::new(FixedAmount(shipping)))
            .with_tax(Arc::new(FixedAmount(tax)))
            .with_promotions(Arc::new(FixedAmount(discount)))
    }
}

/// Returns the same amount for every pricing component it stands in for.
pub(crate) struct FixedAmount(pub Decimal);

#[async_trait]
impl ShippingCalculator for FixedAmount {
    async fn shipping_cost(&self, _cart: &CheckoutCart, _to: &Address) -> Result<Decimal, PricingError> {
        Ok(self.0)
    }
}

#[async_trait]
impl TaxCalculator for FixedAmount {
    async fn tax(&self, _cart: &CheckoutCart, _to: &Address) -> Result<Decimal, PricingError> {
        Ok(self.0)
    }
}

#[async_trait]
impl PromotionEvaluator for FixedAmount {
    async fn discount(&self, _cart: &CheckoutCart, _user: &User) -> Result<Decimal, PricingError> {
        Ok(self.0)
    }
}

pub(crate) fn keyboard(category_id: CategoryId) -> NewProduct {
    NewProduct {
        name: "Mechanical Keyboard 75%".to_string(),
        description: "Hot-swappable 75% keyboard".to_string(),
        price: Decimal::new(10000, 2),
        original_price: Some(Decimal::new(12000, 2)),
        stock_quantity: 25,
        brand: Some("Keychron".to_string()),
        model: Some("K2".to_string()),
        sku: "KB-75-BLK".to_string(),
        weight: Some(Decimal::new(850, 3)),
        dimensions: Some(serde_json::json!({"length": 32.0, "width": 12.0, "height": 4.0})),
        specifications: [("switch".to_string(), serde_json::json!("brown"))]
            .into_iter()
            .collect(),
        images: vec!["https://cdn.example.com/kb-75-blk.jpg".to_string()],
        is_featured: false,
        category_id,
    }
}

pub(crate) fn home_address() -> NewAddress {
    NewAddress {
        label: "Home".to_string(),
        recipient_name: "Rina Wijaya".to_string(),
        phone: "081234567890".to_string(),
        address_line_1: "Jl. Merdeka No. 10".to_string(),
        address_line_2: None,
        city: "Bandung".to_string(),
        province: "Jawa Barat".to_string(),
        postal_code: "40111".to_string(),
        is_default: true,
    }
}
