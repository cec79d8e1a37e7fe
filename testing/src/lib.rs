//! # IAM Projection Testing
//!
//! Testing utilities and helpers for IAM read-model projections.
//!
//! This crate provides:
//! - [`InMemoryExecuter`]: row tables and watermarks with failure injection
//! - [`InMemoryEventSource`]: a replayable, optionally live event log
//! - [`test_event`] and [`EventLog`]: raw event builders
//! - [`ReducerTest`]: Given-When-Then harness for projection dispatch
//! - Property-based testing strategies for at-least-once delivery
//!
//! ## Example
//!
//! ```ignore
//! use iam_projection_testing::{EventLog, InMemoryEventSource, InMemoryExecuter};
//!
//! #[tokio::test]
//! async fn domains_follow_the_log() {
//!     let events = EventLog::new("instance-1")
//!         .push("org", "org-1", "org.domain.added", json!({"domain": "acme.com"}))
//!         .build();
//!     let executer = Arc::new(InMemoryExecuter::new());
//!     let (handler, _shutdown) = ProjectionHandler::new(
//!         OrgDomainProjection::new(catalog),
//!         Arc::new(InMemoryEventSource::with_events(events)),
//!         executer.clone(),
//!     );
//!
//!     handler.run().await.unwrap();
//!     assert_eq!(executer.rows("projections.org_domains").len(), 1);
//! }
//! ```

pub mod event_source;
pub mod events;
pub mod executer;

/// Deterministic values for tests.
pub mod mocks {
    use chrono::{DateTime, Utc};

    /// Creation time of every event built by the helpers (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Install a `tracing` subscriber writing to the test output.
    ///
    /// Honors `RUST_LOG`; safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use iam_projection_core::event::RawEvent;
    use proptest::prelude::*;

    /// Deliveries of `events` as an at-least-once source produces them.
    ///
    /// Every event is delivered in log order. After any event the source may
    /// rewind to an earlier position and redeliver from there, the way a
    /// consumer restarted from an older checkpoint would.
    ///
    /// ```
    /// use iam_projection_testing::{EventLog, properties::at_least_once};
    /// use proptest::strategy::{Strategy, ValueTree};
    /// use proptest::test_runner::TestRunner;
    ///
    /// let events = EventLog::new("i")
    ///     .push("org", "o", "org.removed", serde_json::json!({}))
    ///     .build();
    /// let mut runner = TestRunner::default();
    /// let delivered = at_least_once(events).new_tree(&mut runner).unwrap().current();
    /// assert!(!delivered.is_empty());
    /// ```
    pub fn at_least_once(events: Vec<RawEvent>) -> impl Strategy<Value = Vec<RawEvent>> {
        let len = events.len();
        proptest::collection::vec(proptest::option::weighted(0.3, 0..len.max(1)), len).prop_map(
            move |rewinds| {
                let mut delivered = Vec::with_capacity(len * 2);
                for (position, rewind) in rewinds.into_iter().enumerate() {
                    delivered.push(events[position].clone());
                    if let Some(from) = rewind.filter(|from| *from <= position) {
                        delivered.extend_from_slice(&events[from..=position]);
                    }
                }
                delivered
            },
        )
    }
}

pub use event_source::InMemoryEventSource;
pub use events::{
    EventLog, TEST_AGGREGATE_ID, TEST_INSTANCE_ID, TEST_PREVIOUS_SEQUENCE, TEST_SEQUENCE,
    test_event,
};
pub use executer::{InMemoryExecuter, Row};
pub use mocks::{init_test_tracing, test_time};
pub use reducer_test::{ReducerTest, assertions};
