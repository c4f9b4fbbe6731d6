use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::Product;
use crate::domain::ids::{CartItemId, ProductId, UserId};

// ============================================================================
// Cart Value Objects
// ============================================================================

/// One line per (user, product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How an upsert treats an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartWrite {
    /// Add to the existing quantity.
    Add,
    /// Overwrite the existing quantity.
    Replace,
}

impl CartWrite {
    pub fn merge(self, existing: i32, quantity: i32) -> i32 {
        match self {
            Self::Add => existing.saturating_add(quantity),
            Self::Replace => quantity,
        }
    }
}

/// Live view of a cart, priced at current catalog prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    pub items_count: i64,
    pub total_amount: Decimal,
    pub items: Vec<CartSummaryLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSummaryLine {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub is_active: bool,
    pub in_stock: bool,
}

impl CartSummaryLine {
    pub fn new(item: &CartItem, product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            image: product.primary_image().map(str::to_string),
            unit_price: product.price,
            quantity: item.quantity,
            line_total: product.price * Decimal::from(item.quantity),
            is_active: product.is_active,
            in_stock: product.in_stock(item.quantity),
        }
    }
}

impl CartSummary {
    pub fn from_lines(items: Vec<CartSummaryLine>) -> Self {
        Self {
            items_count: items.iter().map(|l| i64::from(l.quantity)).sum(),
            total_amount: items.iter().map(|l| l.line_total).sum(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_merge_policies() {
        assert_eq!(CartWrite::Add.merge(2, 3), 5);
        assert_eq!(CartWrite::Replace.merge(2, 3), 3);
        assert_eq!(CartWrite::Add.merge(i32::MAX, 1), i32::MAX);
    }

    #[test]
    fn test_summary_totals() {
        let line = |qty: i32, price: Decimal| CartSummaryLine {
            product_id: ProductId::new(1),
            name: "x".to_string(),
            sku: "x".to_string(),
            image: None,
            unit_price: price,
            quantity: qty,
            line_total: price * Decimal::from(qty),
            is_active: true,
            in_stock: true,
        };

        let summary = CartSummary::from_lines(vec![line(2, dec!(10.50)), line(1, dec!(4.25))]);
        assert_eq!(summary.items_count, 3);
        assert_eq!(summary.total_amount, dec!(25.25));

        let empty = CartSummary::from_lines(vec![]);
        assert_eq!(empty.items_count, 0);
        assert_eq!(empty.total_amount, Decimal::ZERO);
    }
}
