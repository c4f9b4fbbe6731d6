// ============================================================================
// Promotion Store - scheduled banners, independent of the order engine
// ============================================================================

pub mod errors;
pub mod service;
pub mod value_objects;

pub use errors::*;
pub use service::*;
pub use value_objects::*;
