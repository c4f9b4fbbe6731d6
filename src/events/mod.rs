// ============================================================================
// Event Journal - Aggregates and Event Envelopes
// ============================================================================
//
// Aggregates turn commands into events; the services persist those events
// in the same transaction as the state change they describe, giving every
// order an append-only audit trail.
//
// ============================================================================

pub mod aggregate;
pub mod envelope;

pub use aggregate::Aggregate;
pub use envelope::{DomainEvent, EventEnvelope};
