// ============================================================================
// Cart Store
// ============================================================================
//
// The cart is optimistic: stock is not checked when items are added, only
// at checkout. Prices shown here are live, unlike order items which freeze
// the price paid.
//
// ============================================================================

pub mod errors;
pub mod service;
pub mod value_objects;

pub use errors::*;
pub use service::*;
pub use value_objects::*;
