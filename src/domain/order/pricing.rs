use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::address::Address;
use crate::domain::round_money;
use crate::domain::user::User;
use crate::validation::MAX_AMOUNT;

use super::value_objects::CheckoutCart;

// ============================================================================
// Pricing Collaborators
// ============================================================================
//
// Shipping, tax and discounts are decided outside the order engine. They
// are awaited before the checkout transaction opens, so a slow rate lookup
// never holds stock locks.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("{component} must not be negative, got {amount}")]
    Negative {
        component: &'static str,
        amount: Decimal,
    },

    #[error("{component} exceeds the largest storable amount, got {amount}")]
    TooLarge {
        component: &'static str,
        amount: Decimal,
    },

    #[error("{component} unavailable: {reason}")]
    Unavailable {
        component: &'static str,
        reason: String,
    },
}

#[async_trait]
pub trait ShippingCalculator: Send + Sync {
    async fn shipping_cost(&self, cart: &CheckoutCart, address: &Address) -> Result<Decimal, PricingError>;
}

#[async_trait]
pub trait TaxCalculator: Send + Sync {
    async fn tax(&self, cart: &CheckoutCart, address: &Address) -> Result<Decimal, PricingError>;
}

#[async_trait]
pub trait PromotionEvaluator: Send + Sync {
    async fn discount(&self, cart: &CheckoutCart, user: &User) -> Result<Decimal, PricingError>;
}

/// Reject negative or oversized collaborator output and round to cents.
pub fn checked_amount(component: &'static str, amount: Decimal) -> Result<Decimal, PricingError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PricingError::Negative { component, amount });
    }
    if amount > MAX_AMOUNT {
        return Err(PricingError::TooLarge { component, amount });
    }
    Ok(round_money(amount))
}

// ============================================================================
// Stock Implementations
// ============================================================================

/// A flat fee per order, waived once the subtotal reaches the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatRateShipping {
    pub fee: Decimal,
    pub free_threshold: Option<Decimal>,
}

impl FlatRateShipping {
    pub fn new(fee: Decimal) -> Self {
        Self {
            fee,
            free_threshold: None,
        }
    }

    pub fn free_over(mut self, threshold: Decimal) -> Self {
        self.free_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl ShippingCalculator for FlatRateShipping {
    async fn shipping_cost(&self, cart: &CheckoutCart, _address: &Address) -> Result<Decimal, PricingError> {
        match self.free_threshold {
            Some(threshold) if cart.subtotal >= threshold => Ok(Decimal::ZERO),
            _ => Ok(self.fee),
        }
    }
}

/// Tax as a fraction of the subtotal, e.g. `0.11` for 11%.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentageTax {
    pub rate: Decimal,
}

impl PercentageTax {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl TaxCalculator for PercentageTax {
    async fn tax(&self, cart: &CheckoutCart, _address: &Address) -> Result<Decimal, PricingError> {
        Ok(round_money(cart.subtotal * self.rate))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPromotion;

#[async_trait]
impl PromotionEvaluator for NoPromotion {
    async fn discount(&self, _cart: &CheckoutCart, _user: &User) -> Result<Decimal, PricingError> {
        Ok(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{AddressId, ProductId, UserId};
    use crate::domain::order::CartLine;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn cart(subtotal_price: Decimal) -> CheckoutCart {
        CheckoutCart::new(
            UserId::new(1),
            vec![CartLine {
                product_id: ProductId::new(1),
                quantity: 1,
                unit_price: subtotal_price,
            }],
        )
    }

    fn address() -> Address {
        let now = Utc::now();
        Address {
            id: AddressId::new(1),
            user_id: UserId::new(1),
            label: "Home".to_string(),
            recipient_name: "Rina".to_string(),
            phone: "0812".to_string(),
            address_line_1: "Jl. Merdeka 1".to_string(),
            address_line_2: None,
            city: "Bandung".to_string(),
            province: "Jawa Barat".to_string(),
            postal_code: "40111".to_string(),
            is_default: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_flat_rate_with_threshold() {
        let shipping = FlatRateShipping::new(dec!(10.00)).free_over(dec!(500.00));

        let small = shipping.shipping_cost(&cart(dec!(499.99)), &address()).await.unwrap();
        let large = shipping.shipping_cost(&cart(dec!(500.00)), &address()).await.unwrap();

        assert_eq!(small, dec!(10.00));
        assert_eq!(large, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_percentage_tax_rounds_to_cents() {
        let tax = PercentageTax::new(dec!(0.11));
        let amount = tax.tax(&cart(dec!(19.99)), &address()).await.unwrap();
        assert_eq!(amount, dec!(2.20));
    }

    #[test]
    fn test_checked_amount() {
        assert_eq!(checked_amount("shipping", dec!(1.005)).unwrap(), dec!(1.01));
        assert!(matches!(
            checked_amount("tax", dec!(-0.01)),
            Err(PricingError::Negative { component: "tax", .. })
        ));
        assert!(matches!(
            checked_amount("shipping", Decimal::MAX),
            Err(PricingError::TooLarge { component: "shipping", .. })
        ));
    }
}
