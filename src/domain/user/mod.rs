// ============================================================================
// User Registry - account records owned by the surrounding auth layer
// ============================================================================

pub mod errors;
pub mod service;
pub mod value_objects;

pub use errors::*;
pub use service::*;
pub use value_objects::*;
