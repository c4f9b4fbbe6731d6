//! Order lifecycle and inventory consistency for a storefront: catalog,
//! carts, addresses, banners, and a checkout that turns a cart into an
//! order while taking stock in one transaction.

pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
