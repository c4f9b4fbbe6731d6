use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ids::UserId;

// ============================================================================
// Event Envelope - metadata wrapped around every journaled event
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: i64,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Correlation groups every event written by one service call
    pub correlation_id: Uuid,

    // Who triggered this event, when known
    pub user_id: Option<UserId>,

    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_id: i64,
        sequence_number: i64,
        event_data: E,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type: event_data.event_type().to_string(),
            event_version: E::event_version(),
            event_data,
            correlation_id,
            user_id: None,
            timestamp,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Implemented by every event union that can be journaled.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    fn event_type(&self) -> &'static str;

    fn event_version() -> i32
    where
        Self: Sized,
    {
        1
    }
}

/// Wrap a batch of events produced by one command, numbering them after
/// `current_version`.
pub fn envelope_all<E: DomainEvent>(
    aggregate_id: i64,
    current_version: i64,
    events: Vec<E>,
    correlation_id: Uuid,
    timestamp: DateTime<Utc>,
    user_id: Option<UserId>,
) -> Vec<EventEnvelope<E>> {
    events
        .into_iter()
        .zip(current_version + 1..)
        .map(|(event, seq)| {
            let envelope = EventEnvelope::new(aggregate_id, seq, event, correlation_id, timestamp);
            match user_id {
                Some(user_id) => envelope.with_user(user_id),
                None => envelope,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    enum TestEvent {
        Opened,
        Closed { reason: String },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Opened => "TestOpened",
                Self::Closed { .. } => "TestClosed",
            }
        }
    }

    #[test]
    fn test_envelope_takes_type_from_event() {
        let correlation_id = Uuid::new_v4();
        let envelope = EventEnvelope::new(9, 1, TestEvent::Opened, correlation_id, Utc::now());

        assert_eq!(envelope.aggregate_id, 9);
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestOpened");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert!(envelope.user_id.is_none());
    }

    #[test]
    fn test_envelope_all_numbers_after_current_version() {
        let events = vec![
            TestEvent::Opened,
            TestEvent::Closed {
                reason: "done".to_string(),
            },
        ];

        let envelopes = envelope_all(3, 4, events, Uuid::new_v4(), Utc::now(), Some(UserId::new(5)));

        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].sequence_number, 5);
        assert_eq!(envelopes[1].sequence_number, 6);
        assert_eq!(envelopes[1].event_type, "TestClosed");
        assert!(envelopes.iter().all(|e| e.user_id == Some(UserId::new(5))));
        assert_eq!(envelopes[0].correlation_id, envelopes[1].correlation_id);
    }
}
