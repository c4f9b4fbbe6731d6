use chrono::{DateTime, Utc};

use super::value_objects::{OrderStatus, PaymentStatus};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================
//
// Placement is not a command: an order comes into existence through
// checkout, which writes the row and journals `OrderEvent::Placed`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    ChangeStatus {
        to: OrderStatus,
        /// Recorded when entering shipped.
        tracking_number: Option<String>,
        at: DateTime<Utc>,
    },
    ChangePaymentStatus {
        to: PaymentStatus,
        at: DateTime<Utc>,
    },
}
