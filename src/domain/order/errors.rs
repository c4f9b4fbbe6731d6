use crate::domain::ids::{AddressId, OrderId, ProductId, UserId};
use crate::errors::{Classify, ErrorKind};
use crate::store::StoreError;
use crate::validation::ValidationError;

use super::pricing::PricingError;
use super::value_objects::{OrderStatus, PaymentStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Address {0} is not a shipping address of this user")]
    InvalidAddress(AddressId),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    #[error("Product is not available for sale: {product_id}")]
    InactiveProduct { product_id: ProductId },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Unknown or inactive user: {0}")]
    UnknownUser(UserId),

    #[error("Price of product {product_id} changed during checkout")]
    PriceChanged { product_id: ProductId },

    #[error("Cart changed during checkout")]
    CartChanged,

    #[error("Cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Cannot move payment from {from} to {to}")]
    IllegalPaymentTransition { from: PaymentStatus, to: PaymentStatus },

    #[error("Order {0} is cancelled; only a refund of a paid order is allowed")]
    PaymentOnCancelledOrder(OrderId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Pricing failed: {0}")]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyCart => "empty_cart",
            Self::InvalidAddress(_) => "invalid_address",
            Self::OutOfStock { .. } => "out_of_stock",
            Self::InactiveProduct { .. } => "inactive_product",
            Self::ProductNotFound(_) => "product_not_found",
            Self::UnknownUser(_) => "unknown_user",
            Self::PriceChanged { .. } => "price_changed",
            Self::CartChanged => "cart_changed",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::IllegalPaymentTransition { .. } => "illegal_payment_transition",
            Self::PaymentOnCancelledOrder(_) => "payment_on_cancelled_order",
            Self::OrderNotFound(_) => "order_not_found",
            Self::Pricing(_) => "pricing",
            Self::Validation(_) => "validation",
            Self::Store(_) => "store",
        }
    }
}

impl Classify for OrderError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress(_)
            | Self::ProductNotFound(_)
            | Self::UnknownUser(_)
            | Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::OutOfStock { .. }
            | Self::PriceChanged { .. }
            | Self::CartChanged
            | Self::IllegalTransition { .. }
            | Self::IllegalPaymentTransition { .. } => ErrorKind::Conflict,
            Self::EmptyCart | Self::InactiveProduct { .. } | Self::PaymentOnCancelledOrder(_) => {
                ErrorKind::State
            }
            Self::Pricing(_) => ErrorKind::Internal,
            Self::Validation(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}
