// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory with value objects, errors and a
// service. The order area additionally carries commands, events and an
// aggregate, since every order change is journaled.
//
// ============================================================================

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};

pub mod ids;

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod promotion;
pub mod user;

/// Round a monetary amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Field of a partial update that can also be cleared. A missing field
/// deserializes to `None` (leave as is), an explicit `null` to `Some(None)`
/// (clear). Use with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(7)), dec!(7));
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_missing_from_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"note": "gift"}"#).unwrap();

        assert_eq!(missing.note, None);
        assert_eq!(cleared.note, Some(None));
        assert_eq!(set.note, Some(Some("gift".to_string())));
    }
}
