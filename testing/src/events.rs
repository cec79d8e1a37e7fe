//! Raw event builders for tests.

#![allow(clippy::missing_panics_doc)]

use crate::mocks::test_time;
use iam_projection_core::event::RawEvent;
use std::collections::HashMap;

/// Aggregate id used by [`test_event`].
pub const TEST_AGGREGATE_ID: &str = "agg-id";
/// Instance id used by [`test_event`].
pub const TEST_INSTANCE_ID: &str = "instance-id";
/// Sequence of the event built by [`test_event`].
pub const TEST_SEQUENCE: u64 = 15;
/// Previous sequence of the event built by [`test_event`].
pub const TEST_PREVIOUS_SEQUENCE: u64 = 10;

/// A raw event from aggregate `agg-id` in instance `instance-id`, sequence 15
/// following 10, created at [`test_time`].
///
/// ```
/// use iam_projection_testing::test_event;
///
/// let raw = test_event("org", "org.domain.added", serde_json::json!({"domain": "domain.new"}));
/// assert_eq!(raw.sequence, 15);
/// assert_eq!(raw.aggregate_id.as_str(), "agg-id");
/// ```
#[must_use]
pub fn test_event(aggregate_type: &str, event_type: &str, payload: serde_json::Value) -> RawEvent {
    RawEvent::builder(aggregate_type, event_type)
        .aggregate_id(TEST_AGGREGATE_ID)
        .instance_id(TEST_INSTANCE_ID)
        .sequence(TEST_SEQUENCE, TEST_PREVIOUS_SEQUENCE)
        .creation_date(test_time())
        .payload(payload.to_string().into_bytes())
        .build()
}

/// Builds a consistent event log for one instance.
///
/// Sequences are assigned from 1 upwards across the whole log, and every
/// event's previous sequence is the sequence of its aggregate's last event
/// (0 for the first). Event `n` is created `n` seconds after [`test_time`].
///
/// # Example
///
/// ```
/// use iam_projection_testing::EventLog;
/// use serde_json::json;
///
/// let events = EventLog::new("instance-1")
///     .push("instance", "instance-1", "instance.added", json!({"name": "Acme"}))
///     .push("org", "org-1", "org.domain.added", json!({"domain": "acme.com"}))
///     .push("org", "org-1", "org.domain.verified", json!({"domain": "acme.com"}))
///     .build();
///
/// assert_eq!(events[2].sequence, 3);
/// assert_eq!(events[2].previous_sequence, 2);
/// assert_eq!(events[1].previous_sequence, 0);
/// ```
#[derive(Clone, Debug)]
pub struct EventLog {
    instance_id: String,
    events: Vec<RawEvent>,
    last_by_aggregate: HashMap<(String, String), u64>,
}

impl EventLog {
    /// Start an empty log for `instance_id`.
    #[must_use]
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            events: Vec::new(),
            last_by_aggregate: HashMap::new(),
        }
    }

    /// Append an event with the next sequence.
    #[must_use]
    pub fn push(
        mut self,
        aggregate_type: &str,
        aggregate_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Self {
        let sequence = self.next_sequence();
        let previous = self
            .last_by_aggregate
            .insert((aggregate_type.to_string(), aggregate_id.to_string()), sequence)
            .unwrap_or(0);

        self.events.push(
            RawEvent::builder(aggregate_type, event_type)
                .aggregate_id(aggregate_id)
                .instance_id(self.instance_id.as_str())
                .sequence(sequence, previous)
                .creation_date(test_time() + chrono::Duration::seconds(seconds(sequence)))
                .payload(payload.to_string().into_bytes())
                .build(),
        );
        self
    }

    /// Sequence the next pushed event will get.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.events.last().map_or(1, |event| event.sequence + 1)
    }

    /// The events in log order.
    #[must_use]
    pub fn build(self) -> Vec<RawEvent> {
        self.events
    }
}

fn seconds(sequence: u64) -> i64 {
    i64::try_from(sequence).unwrap_or(0)
}
