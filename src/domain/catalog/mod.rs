// ============================================================================
// Catalog - categories and products
// ============================================================================
//
// Products are referenced by carts and orders. Stock is only ever taken or
// returned by the order engine inside a storage transaction; catalog updates
// may set it directly (restocking).
//
// ============================================================================

pub mod errors;
pub mod service;
pub mod value_objects;

pub use errors::*;
pub use service::*;
pub use value_objects::*;
