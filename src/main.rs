use std::sync::Arc;

use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shopfront::clock::{Clock, SystemClock};
use shopfront::config::ShopConfig;
use shopfront::domain::address::{AddressService, NewAddress};
use shopfront::domain::cart::CartService;
use shopfront::domain::catalog::{CatalogService, NewCategory, NewProduct};
use shopfront::domain::order::{
    CheckoutRequest, FlatRateShipping, OrderService, OrderStatus, PaymentMethod, PaymentStatus,
    PercentageTax,
};
use shopfront::domain::promotion::{BannerService, NewBanner};
use shopfront::domain::user::{NewUser, UserService};
use shopfront::metrics::ShopMetrics;
use shopfront::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shopfront=debug")),
        )
        .init();

    tracing::info!("🚀 Starting shopfront order engine demo");

    // === 1. Configuration and storage ===
    let config = ShopConfig::from_env()?;
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!(max_connections = config.db_max_connections, "Connecting to PostgreSQL...");
            let pg = PgStore::connect(url, config.db_max_connections).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // === 2. Metrics ===
    let metrics = Arc::new(ShopMetrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Services ===
    let mut shipping = FlatRateShipping::new(config.flat_shipping);
    if let Some(threshold) = config.free_shipping_threshold {
        shipping = shipping.free_over(threshold);
    }
    let users = UserService::new(store.clone(), clock.clone());
    let catalog = CatalogService::new(store.clone(), clock.clone());
    let addresses = AddressService::new(store.clone(), clock.clone());
    let carts = CartService::new(store.clone(), clock.clone());
    let banners = BannerService::new(store.clone(), clock.clone());
    let orders = OrderService::new(store.clone(), clock.clone(), metrics.clone())
        .with_shipping(Arc::new(shipping))
        .with_tax(Arc::new(PercentageTax::new(config.tax_rate)))
        .with_order_prefix(config.order_prefix.clone());

    // === 4. Seed a catalog and a shopper ===
    // Unique suffix so repeated runs against one database do not collide.
    let run = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();

    let category = catalog
        .create_category(NewCategory {
            name: format!("Peripherals {run}"),
            description: Some("Keyboards, mice and headsets".to_string()),
            icon_name: "keyboard".to_string(),
            sort_order: 1,
        })
        .await?;

    let keyboard = catalog
        .create_product(NewProduct {
            name: "Mechanical Keyboard 75%".to_string(),
            description: "Hot-swappable 75% keyboard".to_string(),
            price: Decimal::new(100_00, 2),
            original_price: Some(Decimal::new(120_00, 2)),
            stock_quantity: 5,
            brand: Some("Keychron".to_string()),
            model: Some("K2".to_string()),
            sku: format!("KB-75-{run}"),
            weight: Some(Decimal::new(850, 3)),
            dimensions: None,
            specifications: Default::default(),
            images: vec!["https://cdn.example.com/kb-75.jpg".to_string()],
            is_featured: true,
            category_id: category.id,
        })
        .await?;

    banners
        .create(NewBanner {
            title: "Keyboard week".to_string(),
            subtitle: Some("Free shipping on big orders".to_string()),
            image_url: "https://cdn.example.com/banners/keyboards.jpg".to_string(),
            link_url: None,
            sort_order: 0,
            start_date: None,
            end_date: None,
        })
        .await?;
    tracing::info!(live_banners = banners.list_live().await?.len(), "Banners ready");

    let user = users
        .register(NewUser {
            email: format!("rina.{}@example.com", run.to_lowercase()),
            name: "Rina Wijaya".to_string(),
            phone: Some("081234567890".to_string()),
        })
        .await?;
    let address = addresses
        .add(
            user.id,
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
            },
        )
        .await?;

    // === 5. Checkout and lifecycle ===
    tracing::info!("📝 Demonstrating checkout and the order lifecycle");

    carts.add_item(user.id, keyboard.id, 2).await?;
    let summary = carts.summary(user.id).await?;
    tracing::info!(items = summary.items_count, total = %summary.total_amount, "Cart ready");

    let placed = orders
        .checkout(
            user.id,
            CheckoutRequest {
                payment_method: PaymentMethod::BankTransfer,
                shipping_address_id: address.id,
                notes: Some("Leave at the door".to_string()),
            },
        )
        .await?;
    let order_id = placed.order.id;
    tracing::info!("✅ Order placed: {}", placed.order.order_number);

    orders.update_payment_status(order_id, PaymentStatus::Paid).await?;
    orders.transition_status(order_id, OrderStatus::Confirmed).await?;
    orders.transition_status(order_id, OrderStatus::Processing).await?;
    orders.ship(order_id, "JNE-0001").await?;
    orders.transition_status(order_id, OrderStatus::Delivered).await?;
    tracing::info!("✅ Order delivered: {}", placed.order.order_number);

    // A second order that is cancelled puts its stock back.
    carts.add_item(user.id, keyboard.id, 1).await?;
    let second = orders
        .checkout(
            user.id,
            CheckoutRequest {
                payment_method: PaymentMethod::Cod,
                shipping_address_id: address.id,
                notes: None,
            },
        )
        .await?;
    orders.transition_status(second.order.id, OrderStatus::Cancelled).await?;
    tracing::info!("✅ Order cancelled: {}", second.order.order_number);

    let remaining = catalog.get_product(keyboard.id).await?.stock_quantity;
    tracing::info!(sku = %keyboard.sku, remaining, "Stock after demo");

    let response = orders.order_response(order_id).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    for event in orders.order_events(order_id).await? {
        tracing::debug!(
            sequence = event.sequence_number,
            event_type = %event.event_type,
            "Journaled event"
        );
    }

    println!("{}", metrics.encode_text()?);

    tracing::info!("🎉 Demo complete!");
    Ok(())
}
