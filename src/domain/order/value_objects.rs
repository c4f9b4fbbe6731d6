use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::address::{Address, NewAddress};
use crate::domain::catalog::Product;
use crate::domain::ids::{AddressId, OrderId, OrderItemId, ProductId, UserId};
use crate::domain::round_money;
use crate::validation::{self, Validate, ValidationError};

// ============================================================================
// Order Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The order state machine. Everything not listed is illegal, including
    /// staying in the same state.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [Self::Pending, Self::Paid, Self::Failed, Self::Refunded];

    /// A failed payment may be retried (back to pending) or settle late.
    /// Only a paid order can be refunded.
    pub fn can_transition_to(self, to: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, to),
            (Pending, Paid) | (Pending, Failed) | (Failed, Pending) | (Failed, Paid) | (Paid, Refunded)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    EWallet,
    Cod,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::EWallet => "e_wallet",
            Self::Cod => "cod",
        }
    }
}

// ============================================================================
// Totals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// Rounds every component to cents and caps the discount at the gross
    /// amount, so `total = subtotal + shipping + tax - discount` holds exactly
    /// and is never negative.
    pub fn compute(subtotal: Decimal, shipping: Decimal, tax: Decimal, discount: Decimal) -> Self {
        let subtotal = round_money(subtotal);
        let shipping_cost = round_money(shipping);
        let tax_amount = round_money(tax);
        let gross = subtotal + shipping_cost + tax_amount;
        let discount_amount = round_money(discount).min(gross);

        Self {
            subtotal,
            shipping_cost,
            tax_amount,
            discount_amount,
            total_amount: gross - discount_amount,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_amount
            == self.subtotal + self.shipping_cost + self.tax_amount - self.discount_amount
    }
}

// ============================================================================
// Order
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipping_address_id: AddressId,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of journaled events.
    pub version: i64,
}

impl Order {
    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
        }
    }
}

/// Order row as written at checkout. Status and payment status start at
/// pending; the version starts at zero until the placement event is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub shipping_address_id: AddressId,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            order_number: self.order_number,
            user_id: self.user_id,
            status: OrderStatus::Pending,
            subtotal: self.totals.subtotal,
            shipping_cost: self.totals.shipping_cost,
            tax_amount: self.totals.tax_amount,
            discount_amount: self.totals.discount_amount,
            total_amount: self.totals.total_amount,
            payment_method: self.payment_method,
            payment_status: PaymentStatus::Pending,
            shipping_address_id: self.shipping_address_id,
            notes: self.notes,
            tracking_number: None,
            shipped_at: None,
            delivered_at: None,
            created_at: self.created_at,
            updated_at: self.created_at,
            version: 0,
        }
    }
}

// ============================================================================
// Order Items
// ============================================================================

/// Product details frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            sku: product.sku.clone(),
            price: product.price,
            image: product.primary_image().map(str::to_string),
            brand: product.brand.clone(),
            model: product.model.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    #[sqlx(json)]
    pub product_snapshot: ProductSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub product_snapshot: ProductSnapshot,
}

impl NewOrderItem {
    pub fn from_product(product: &Product, quantity: i32) -> Self {
        Self {
            product_id: product.id,
            quantity,
            unit_price: product.price,
            total_price: round_money(product.price * Decimal::from(quantity)),
            product_snapshot: ProductSnapshot::from(product),
        }
    }

    pub fn into_item(self, id: OrderItemId, order_id: OrderId) -> OrderItem {
        OrderItem {
            id,
            order_id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
            product_snapshot: self.product_snapshot,
        }
    }
}

// ============================================================================
// Checkout Input & Quote
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub shipping_address_id: AddressId,
    pub notes: Option<String>,
}

impl Validate for CheckoutRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::optional_max_len("notes", self.notes.as_deref(), 500)
    }
}

/// One cart line priced at the time of the quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The cart as handed to the pricing collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCart {
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
}

impl CheckoutCart {
    pub fn new(user_id: UserId, lines: Vec<CartLine>) -> Self {
        let subtotal = round_money(lines.iter().map(CartLine::line_total).sum());
        Self {
            user_id,
            lines,
            subtotal,
        }
    }

    pub fn total_units(&self) -> i64 {
        self.lines.iter().map(|l| i64::from(l.quantity)).sum()
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }
}

// ============================================================================
// Read Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_snapshot.name.clone(),
            sku: item.product_snapshot.sku.clone(),
            image: item.product_snapshot.image.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }
}

/// Flattened order projection with RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<String>,
    pub delivered_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub shipping_address: NewAddress,
    pub order_items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_parts(details: OrderDetails, address: &Address) -> Self {
        let OrderDetails { order, items } = details;
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            tax_amount: order.tax_amount,
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            notes: order.notes,
            tracking_number: order.tracking_number,
            shipped_at: order.shipped_at.map(|t| t.to_rfc3339()),
            delivered_at: order.delivered_at.map(|t| t.to_rfc3339()),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
            shipping_address: NewAddress::from(address),
            order_items: items.iter().map(OrderItemResponse::from).collect(),
        }
    }
}

/// `<prefix>-<YYYYMMDD>-<12 hex>`, e.g. `ORD-20240301-9f1c2a7b4e0d`.
pub fn order_number(prefix: &str, at: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, at.format("%Y%m%d"), &random[..12])
}

// ============================================================================
// Unit Tests
// ============================================================================
