use rust_decimal::Decimal;

// ============================================================================
// Field Validation
// ============================================================================
//
// Input shapes (NewProduct, AddressUpdate, ...) are checked here before they
// reach storage. Each check names the offending field so the caller can map
// the failure back to its form or request body.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
    },

    #[error("{field} allows at most {places} decimal places")]
    TooPrecise { field: &'static str, places: u32 },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Implemented by every create/update input shape.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Required text: non-blank and within `max` characters.
pub fn required(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    max_len(field, value, max)
}

pub fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn optional_max_len(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(v) => max_len(field, v, max),
        None => Ok(()),
    }
}

/// Largest amount a `NUMERIC(12, 2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Non-negative decimal with at most `places` fractional digits, no larger
/// than `MAX_AMOUNT`.
pub fn amount(field: &'static str, value: Decimal, places: u32) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::Negative { field });
    }
    if value > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field,
            min: "0".to_string(),
            max: MAX_AMOUNT.to_string(),
        });
    }
    if value.normalize().scale() > places {
        return Err(ValidationError::TooPrecise { field, places });
    }
    Ok(())
}

pub fn optional_amount(
    field: &'static str,
    value: Option<Decimal>,
    places: u32,
) -> Result<(), ValidationError> {
    match value {
        Some(v) => amount(field, v, places),
        None => Ok(()),
    }
}

pub fn decimal_range(
    field: &'static str,
    value: Decimal,
    min: Decimal,
    max: Decimal,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

pub fn non_negative(field: &'static str, value: i32) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative { field });
    }
    Ok(())
}

/// Quantities on cart and order lines start at one.
pub fn quantity(value: i32) -> Result<(), ValidationError> {
    if value < 1 {
        return Err(ValidationError::OutOfRange {
            field: "quantity",
            min: "1".to_string(),
            max: i32::MAX.to_string(),
        });
    }
    Ok(())
}

/// Checks the `local@domain.tld` shape accepted for user e-mail addresses.
pub fn email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::Invalid {
        field,
        reason: reason.to_string(),
    };

    let (local, domain) = value.split_once('@').ok_or_else(|| invalid("missing @"))?;

    if local.is_empty() {
        return Err(invalid("empty local part"));
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
    {
        return Err(invalid("unsupported character in local part"));
    }

    let (host, tld) = domain.split_once('.').ok_or_else(|| invalid("missing domain suffix"))?;
    if host.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("malformed domain"));
    }
    if tld.is_empty()
        || !tld
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'))
    {
        return Err(invalid("malformed domain suffix"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_required_rejects_blank() {
        assert_eq!(
            required("name", "   ", 10),
            Err(ValidationError::Empty { field: "name" })
        );
    }

    #[test]
    fn test_max_len_counts_chars_not_bytes() {
        assert!(max_len("label", "ñññ", 3).is_ok());
        assert!(max_len("label", "ññññ", 3).is_err());
    }

    #[test]
    fn test_amount_rejects_negative_and_extra_precision() {
        assert!(amount("price", dec!(10.50), 2).is_ok());
        assert!(amount("price", dec!(0), 2).is_ok());
        assert_eq!(
            amount("price", dec!(-0.01), 2),
            Err(ValidationError::Negative { field: "price" })
        );
        assert_eq!(
            amount("price", dec!(1.005), 2),
            Err(ValidationError::TooPrecise {
                field: "price",
                places: 2
            })
        );
    }

    #[test]
    fn test_amount_is_capped_at_column_size() {
        assert_eq!(MAX_AMOUNT, dec!(9999999999.99));
        assert!(amount("price", dec!(9999999999.99), 2).is_ok());
        assert!(matches!(
            amount("price", dec!(10000000000.00), 2),
            Err(ValidationError::OutOfRange { field: "price", .. })
        ));
        assert!(optional_amount("original_price", Some(dec!(100000000000000000000.00)), 2).is_err());
    }

    #[test]
    fn test_amount_ignores_trailing_zeros() {
        assert!(amount("price", dec!(1.5000), 2).is_ok());
    }

    #[test]
    fn test_decimal_range() {
        assert!(decimal_range("rating", dec!(4.5), dec!(0), dec!(5)).is_ok());
        assert!(decimal_range("rating", dec!(5.01), dec!(0), dec!(5)).is_err());
    }

    #[test]
    fn test_quantity_starts_at_one() {
        assert!(quantity(1).is_ok());
        assert!(quantity(0).is_err());
        assert!(quantity(-3).is_err());
    }

    #[test]
    fn test_email_shapes() {
        assert!(email("email", "jane.doe+shop@example.co.id").is_ok());
        assert!(email("email", "no-at-symbol").is_err());
        assert!(email("email", "@example.com").is_err());
        assert!(email("email", "jane@localhost").is_err());
        assert!(email("email", "jane@exa mple.com").is_err());
        assert!(email("email", "ja ne@example.com").is_err());
    }
}
