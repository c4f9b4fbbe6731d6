use std::str::FromStr;

use rust_decimal::Decimal;

// ============================================================================
// Configuration
// ============================================================================
//
// Read from the process environment after loading an optional `.env` file.
//
//   DATABASE_URL                  PostgreSQL url; unset selects the in-memory store
//   SHOP_DB_MAX_CONNECTIONS       pool size (default 5)
//   SHOP_ORDER_PREFIX             order number prefix (default ORD)
//   SHOP_FLAT_SHIPPING            flat shipping fee (default 10.00)
//   SHOP_FREE_SHIPPING_THRESHOLD  subtotal at which shipping is free (optional)
//   SHOP_TAX_RATE                 fraction of the subtotal, 0..=1 (default 0.00)
//
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShopConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub order_prefix: String,
    pub flat_shipping: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub tax_rate: Decimal,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            order_prefix: "ORD".to_string(),
            flat_shipping: Decimal::new(1000, 2),
            free_shipping_threshold: None,
            tax_rate: Decimal::ZERO,
        }
    }
}

impl ShopConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let db_max_connections = match get("SHOP_DB_MAX_CONNECTIONS") {
            Some(raw) => {
                let n: u32 = parse("SHOP_DB_MAX_CONNECTIONS", &raw)?;
                if n == 0 {
                    return Err(invalid("SHOP_DB_MAX_CONNECTIONS", raw, "must be at least 1"));
                }
                n
            }
            None => defaults.db_max_connections,
        };

        let order_prefix = match get("SHOP_ORDER_PREFIX") {
            Some(prefix) if prefix.chars().all(|c| c.is_ascii_alphanumeric()) && prefix.len() <= 10 => prefix,
            Some(prefix) => {
                return Err(invalid(
                    "SHOP_ORDER_PREFIX",
                    prefix,
                    "expected up to 10 ASCII letters or digits",
                ))
            }
            None => defaults.order_prefix,
        };

        let flat_shipping = match get("SHOP_FLAT_SHIPPING") {
            Some(raw) => money("SHOP_FLAT_SHIPPING", &raw)?,
            None => defaults.flat_shipping,
        };

        let free_shipping_threshold = get("SHOP_FREE_SHIPPING_THRESHOLD")
            .map(|raw| money("SHOP_FREE_SHIPPING_THRESHOLD", &raw))
            .transpose()?;

        let tax_rate = match get("SHOP_TAX_RATE") {
            Some(raw) => {
                let rate: Decimal = parse("SHOP_TAX_RATE", &raw)?;
                if rate < Decimal::ZERO || rate > Decimal::ONE {
                    return Err(invalid("SHOP_TAX_RATE", raw, "must be between 0 and 1"));
                }
                rate
            }
            None => defaults.tax_rate,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            db_max_connections,
            order_prefix,
            flat_shipping,
            free_shipping_threshold,
            tax_rate,
        })
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value,
        reason: reason.into(),
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| invalid(key, raw.to_string(), e.to_string()))
}

fn money(key: &'static str, raw: &str) -> Result<Decimal, ConfigError> {
    let value: Decimal = parse(key, raw)?;
    if value.is_sign_negative() {
        return Err(invalid(key, raw.to_string(), "must not be negative"));
    }
    Ok(crate::domain::round_money(value))
}
