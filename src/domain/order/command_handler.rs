use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::address::Address;
use crate::domain::cart::CartItem;
use crate::domain::ids::{OrderId, ProductId, UserId};
use crate::domain::user::User;
use crate::errors::Classify;
use crate::events::envelope::envelope_all;
use crate::events::{Aggregate, EventEnvelope};
use crate::metrics::ShopMetrics;
use crate::store::{Store, StoreError, StoreTx};
use crate::validation::{self, Validate};

use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::pricing::*;
use super::value_objects::*;

// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → one storage transaction
// (order row, stock side effects, event journal).
//
// Checkout prices the cart and awaits the pricing collaborators first, then
// opens a transaction, re-checks the cart and every product under lock and
// writes everything at once. Any failure drops the transaction.
//
// ============================================================================

pub const DEFAULT_ORDER_PREFIX: &str = "ORD";

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ShopMetrics>,
    shipping: Arc<dyn ShippingCalculator>,
    tax: Arc<dyn TaxCalculator>,
    promotions: Arc<dyn PromotionEvaluator>,
    order_prefix: String,
}

impl OrderService {
    /// Free shipping, no tax and no promotions until configured otherwise.
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, metrics: Arc<ShopMetrics>) -> Self {
        Self {
            store,
            clock,
            metrics,
            shipping: Arc::new(FlatRateShipping::new(Decimal::ZERO)),
            tax: Arc::new(PercentageTax::new(Decimal::ZERO)),
            promotions: Arc::new(NoPromotion),
            order_prefix: DEFAULT_ORDER_PREFIX.to_string(),
        }
    }

    pub fn with_shipping(mut self, shipping: Arc<dyn ShippingCalculator>) -> Self {
        self.shipping = shipping;
        self
    }

    pub fn with_tax(mut self, tax: Arc<dyn TaxCalculator>) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_promotions(mut self, promotions: Arc<dyn PromotionEvaluator>) -> Self {
        self.promotions = promotions;
        self
    }

    pub fn with_order_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.order_prefix = prefix.into();
        self
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    #[tracing::instrument(skip(self, request))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<OrderDetails, OrderError> {
        let started = Instant::now();
        let result = self.place_order(user_id, request).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(details) => {
                let units: i64 = details.items.iter().map(|i| i64::from(i.quantity)).sum();
                self.metrics.record_checkout("success", elapsed);
                self.metrics.record_units_sold(units as u64);
                tracing::info!(
                    order_id = %details.order.id,
                    order_number = %details.order.order_number,
                    total = %details.order.total_amount,
                    units,
                    "Order placed"
                );
            }
            Err(e) => {
                self.metrics.record_checkout(e.reason(), elapsed);
                tracing::warn!(error = %e, kind = %e.kind(), "Checkout rejected");
            }
        }

        result
    }

    async fn place_order(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<OrderDetails, OrderError> {
        request.validate()?;

        let user = self.active_user(user_id).await?;
        let address = self
            .store
            .get_address(request.shipping_address_id)
            .await?
            .filter(|a| a.belongs_to(user_id))
            .ok_or(OrderError::InvalidAddress(request.shipping_address_id))?;

        let quote = self.quote(user_id).await?;
        let totals = self.price(&quote, &address, &user).await?;

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let cart = tx.lock_cart(user_id).await?;
        if !cart_matches(&cart, &quote) {
            return Err(OrderError::CartChanged);
        }

        let new_items = reserve_stock(tx.as_mut(), &quote, now).await?;

        let order = tx
            .insert_order(NewOrder {
                order_number: order_number(&self.order_prefix, now),
                user_id,
                totals,
                payment_method: request.payment_method,
                shipping_address_id: address.id,
                notes: request.notes,
                created_at: now,
            })
            .await?;
        let items = tx.insert_order_items(order.id, new_items).await?;
        let cart_ids: Vec<_> = cart.iter().map(|line| line.id).collect();
        tx.remove_cart_items(&cart_ids).await?;

        let placed = OrderEvent::Placed(OrderPlaced {
            order_number: order.order_number.clone(),
            user_id,
            payment_method: order.payment_method,
            total_amount: order.total_amount,
            lines: items
                .iter()
                .map(|i| StockLine {
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect(),
            placed_at: now,
        });

        let mut aggregate = OrderAggregate::new(order, items);
        let envelopes = envelope_all(
            aggregate.aggregate_id(),
            aggregate.version(),
            vec![placed.clone()],
            Uuid::new_v4(),
            now,
            Some(user_id),
        );
        aggregate.apply_event(&placed)?;

        tx.save_order(aggregate.order()).await?;
        tx.append_order_events(&envelopes).await?;
        tx.commit().await?;

        let (order, items) = aggregate.into_parts();
        Ok(OrderDetails { order, items })
    }

    async fn active_user(&self, user_id: UserId) -> Result<User, OrderError> {
        self.store
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(OrderError::UnknownUser(user_id))
    }

    /// Price every cart line at the product's current price.
    async fn quote(&self, user_id: UserId) -> Result<CheckoutCart, OrderError> {
        let items = self.store.cart_items(user_id).await?;
        if items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let product = self
                .store
                .get_product(item.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(item.product_id))?;
            if !product.is_active {
                return Err(OrderError::InactiveProduct {
                    product_id: product.id,
                });
            }
            lines.push(CartLine {
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        Ok(CheckoutCart::new(user_id, lines))
    }

    async fn price(
        &self,
        quote: &CheckoutCart,
        address: &Address,
        user: &User,
    ) -> Result<OrderTotals, OrderError> {
        let shipping = checked_amount("shipping", self.shipping.shipping_cost(quote, address).await?)?;
        let tax = checked_amount("tax", self.tax.tax(quote, address).await?)?;
        let discount = checked_amount("discount", self.promotions.discount(quote, user).await?)?;

        let totals = OrderTotals::compute(quote.subtotal, shipping, tax, discount);
        validation::amount("subtotal", totals.subtotal, 2)?;
        validation::amount("total_amount", totals.total_amount, 2)?;
        Ok(totals)
    }

    // ========================================================================
    // Status & Payment
    // ========================================================================

    #[tracing::instrument(skip(self))]
    pub async fn transition_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
    ) -> Result<Order, OrderError> {
        self.execute(
            order_id,
            OrderCommand::ChangeStatus {
                to,
                tracking_number: None,
                at: self.clock.now(),
            },
        )
        .await
    }

    /// The shipped transition, recording the carrier's tracking number.
    #[tracing::instrument(skip(self))]
    pub async fn ship(&self, order_id: OrderId, tracking_number: &str) -> Result<Order, OrderError> {
        validation::required("tracking_number", tracking_number, 100)?;
        self.execute(
            order_id,
            OrderCommand::ChangeStatus {
                to: OrderStatus::Shipped,
                tracking_number: Some(tracking_number.to_string()),
                at: self.clock.now(),
            },
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: OrderId,
        to: PaymentStatus,
    ) -> Result<Order, OrderError> {
        self.execute(
            order_id,
            OrderCommand::ChangePaymentStatus {
                to,
                at: self.clock.now(),
            },
        )
        .await
    }

    /// Run a command against the locked order and persist its events and
    /// their stock side effects in one transaction.
    async fn execute(&self, order_id: OrderId, command: OrderCommand) -> Result<Order, OrderError> {
        let at = match &command {
            OrderCommand::ChangeStatus { at, .. } | OrderCommand::ChangePaymentStatus { at, .. } => *at,
        };

        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let items = tx.order_items(order_id).await?;

        let mut aggregate = OrderAggregate::new(order, items);
        let current_version = aggregate.version();
        let events = aggregate.execute(&command)?;

        for event in &events {
            if let OrderEvent::StockRestored(restored) = event {
                for line in &restored.lines {
                    let stock = tx.increment_stock(line.product_id, line.quantity, at).await?;
                    tracing::debug!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        stock,
                        "Stock restored"
                    );
                }
            }
        }

        tx.save_order(aggregate.order()).await?;
        let envelopes = envelope_all(
            order_id.as_i64(),
            current_version,
            events,
            Uuid::new_v4(),
            at,
            None,
        );
        tx.append_order_events(&envelopes).await?;
        tx.commit().await?;

        for envelope in &envelopes {
            self.observe(order_id, &envelope.event_data);
        }

        let (order, _) = aggregate.into_parts();
        Ok(order)
    }

    fn observe(&self, order_id: OrderId, event: &OrderEvent) {
        match event {
            OrderEvent::StatusChanged(e) => {
                self.metrics
                    .record_order_transition(e.from.as_str(), e.to.as_str());
                tracing::info!(
                    order_id = %order_id,
                    from = %e.from,
                    to = %e.to,
                    "Order status changed"
                );
            }
            OrderEvent::PaymentStatusChanged(e) => {
                self.metrics
                    .record_payment_transition(e.from.as_str(), e.to.as_str());
                tracing::info!(
                    order_id = %order_id,
                    from = %e.from,
                    to = %e.to,
                    "Payment status changed"
                );
            }
            OrderEvent::StockRestored(e) => {
                self.metrics.record_stock_restored(e.total_units() as u64);
            }
            OrderEvent::Placed(_) => {}
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderDetails, OrderError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let items = self.store.order_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Newest first.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders(user_id).await?)
    }

    pub async fn order_events(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<EventEnvelope<OrderEvent>>, OrderError> {
        if self.store.get_order(order_id).await?.is_none() {
            return Err(OrderError::OrderNotFound(order_id));
        }
        Ok(self.store.order_events(order_id).await?)
    }

    pub async fn order_response(&self, order_id: OrderId) -> Result<OrderResponse, OrderError> {
        let details = self.get_order(order_id).await?;
        let address_id = details.order.shipping_address_id;
        let address = self
            .store
            .get_address(address_id)
            .await?
            .ok_or_else(|| StoreError::not_found("address", address_id))?;
        Ok(OrderResponse::from_parts(details, &address))
    }
}

/// The locked cart must hold exactly the quoted (product, quantity) pairs.
fn cart_matches(cart: &[CartItem], quote: &CheckoutCart) -> bool {
    let mut locked: Vec<(ProductId, i32)> = cart.iter().map(|i| (i.product_id, i.quantity)).collect();
    let mut quoted: Vec<(ProductId, i32)> = quote.lines.iter().map(|l| (l.product_id, l.quantity)).collect();
    locked.sort_unstable();
    quoted.sort_unstable();
    locked == quoted
}

/// Lock the quoted products, re-check them and take the stock. Returns the
/// order items in cart order.
async fn reserve_stock(
    tx: &mut dyn StoreTx,
    quote: &CheckoutCart,
    now: DateTime<Utc>,
) -> Result<Vec<NewOrderItem>, OrderError> {
    let mut ids: Vec<ProductId> = quote.lines.iter().map(|l| l.product_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let products = tx.lock_products(&ids).await?;

    for id in &ids {
        let line = quote.line(*id).ok_or(OrderError::CartChanged)?;
        let product = products
            .iter()
            .find(|p| p.id == *id)
            .ok_or(OrderError::ProductNotFound(*id))?;
        if !product.is_active {
            return Err(OrderError::InactiveProduct { product_id: *id });
        }
        if product.price != line.unit_price {
            return Err(OrderError::PriceChanged { product_id: *id });
        }
        if !product.in_stock(line.quantity) {
            return Err(OrderError::OutOfStock {
                product_id: *id,
                requested: line.quantity,
                available: product.stock_quantity,
            });
        }
    }

    for product in &products {
        let Some(line) = quote.line(product.id) else {
            continue;
        };
        tx.decrement_stock(product.id, line.quantity, now)
            .await?
            .ok_or(OrderError::OutOfStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.stock_quantity,
            })?;
    }

    quote
        .lines
        .iter()
        .map(|line| {
            products
                .iter()
                .find(|p| p.id == line.product_id)
                .map(|p| NewOrderItem::from_product(p, line.quantity))
                .ok_or(OrderError::ProductNotFound(line.product_id))
        })
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================
