use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ProductId, UserId};
use crate::events::DomainEvent;

use super::value_objects::{OrderStatus, PaymentMethod, PaymentStatus};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    StatusChanged(OrderStatusChanged),
    PaymentStatusChanged(PaymentStatusChanged),
    StockRestored(StockRestored),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Placed(_) => "OrderPlaced",
            Self::StatusChanged(_) => "OrderStatusChanged",
            Self::PaymentStatusChanged(_) => "PaymentStatusChanged",
            Self::StockRestored(_) => "StockRestored",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Quantity of one product taken from, or returned to, stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Checkout committed: stock taken, cart cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_number: String,
    pub user_id: UserId,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub lines: Vec<StockLine>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub tracking_number: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusChanged {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub changed_at: DateTime<Utc>,
}

/// Emitted alongside a cancellation; the caller returns the units to stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRestored {
    pub lines: Vec<StockLine>,
}

impl StockRestored {
    pub fn total_units(&self) -> i64 {
        self.lines.iter().map(|l| i64::from(l.quantity)).sum()
    }
}
