// ============================================================================
// Order Domain - checkout and the order lifecycle
// ============================================================================
//
// - Value objects (Order, OrderItem, statuses, totals, responses)
// - Events journaled per order (OrderPlaced, OrderStatusChanged, ...)
// - Commands accepted by the aggregate
// - Pricing collaborators (shipping, tax, promotions)
// - Aggregate (status and payment graphs)
// - OrderService (checkout transaction and lifecycle operations)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod pricing;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use pricing::*;
pub use aggregate::*;
pub use command_handler::*;
