//! Error type shared by mappers, reducers, executers and the consumption loop.

use thiserror::Error;

/// Error type for projection operations.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The raw payload does not match the schema the mapper expects.
    ///
    /// Not retried: the event stays unapplied until the schema or mapper is fixed.
    #[error("Deserialization error for {event_type}: {reason}")]
    Deserialization {
        /// Event type tag of the offending event
        event_type: String,
        /// Decoder message
        reason: String,
    },

    /// A mapper or reducer was handed an event of a kind it does not handle.
    #[error("Invalid argument: expected {expected}, got {actual}")]
    InvalidArgument {
        /// The event kind the callee handles
        expected: String,
        /// The event kind it received
        actual: String,
    },

    /// No mapper is known for the event's type tags.
    #[error("Unknown event type {event_type} for aggregate type {aggregate_type}")]
    UnknownEventType {
        /// Aggregate type tag
        aggregate_type: String,
        /// Event type tag
        event_type: String,
    },

    /// A statement was built with a shape its operation does not allow.
    #[error("Invalid statement on {table}: {reason}")]
    InvalidStatement {
        /// Target table
        table: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// The executer could not commit a statement batch.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The sequence watermark could not be read.
    #[error("Watermark error: {0}")]
    Watermark(String),

    /// The event's predecessor has not been applied to this scope yet.
    #[error(
        "Sequence gap in {scope}: watermark is {watermark}, event {sequence} expects predecessor {previous_sequence}"
    )]
    SequenceGap {
        /// Watermark scope, rendered for diagnostics
        scope: String,
        /// Highest sequence applied to the scope
        watermark: u64,
        /// Sequence of the rejected event
        sequence: u64,
        /// Sequence the writer observed before the rejected event
        previous_sequence: u64,
    },

    /// The event source failed to deliver events.
    #[error("Event source error: {0}")]
    EventSource(String),
}

impl ProjectionError {
    /// Whether the consumption loop should retry the same event after this error.
    ///
    /// Only storage and transport failures are transient; decoding and dispatch
    /// errors need a code or schema fix.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Execution(_) | Self::Watermark(_) | Self::EventSource(_)
        )
    }

    /// Build an [`ProjectionError::InvalidArgument`] for a reducer that expected `expected`.
    #[must_use]
    pub fn invalid_argument(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidArgument {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
