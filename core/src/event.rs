//! Event model and per-type event mappers.
//!
//! The event store hands the engine [`RawEvent`]s: type tags, sequence numbers and
//! an opaque JSON payload. A mapper turns one raw event into a typed [`Event<P>`]
//! where `P` is the payload schema for exactly one event type.
//!
//! # Example
//!
//! ```
//! use iam_projection_core::event::{Event, EventMapper, RawEvent};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct InstanceAdded {
//!     name: String,
//! }
//!
//! impl EventMapper for InstanceAdded {
//!     const AGGREGATE_TYPE: &'static str = "instance";
//!     const EVENT_TYPE: &'static str = "instance.added";
//! }
//!
//! let raw = RawEvent::builder("instance", "instance.added")
//!     .payload(br#"{"name": "Name"}"#.to_vec())
//!     .build();
//! let event = Event::<InstanceAdded>::map(&raw).unwrap();
//! assert_eq!(event.payload.name, "Name");
//! ```

use crate::aggregate::{AggregateId, EventKey, InstanceId};
use crate::error::{ProjectionError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An event as delivered by the event store, before decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Aggregate the event belongs to.
    pub aggregate_id: AggregateId,
    /// Aggregate type tag (e.g. `"org"`).
    pub aggregate_type: String,
    /// Event type tag (e.g. `"org.domain.added"`).
    pub event_type: String,
    /// Instance (tenant) the aggregate lives in.
    pub instance_id: InstanceId,
    /// Position of this event in the log; strictly increasing.
    pub sequence: u64,
    /// Sequence of the aggregate's preceding event (0 for the first).
    pub previous_sequence: u64,
    /// When the event was appended to the log.
    pub creation_date: DateTime<Utc>,
    /// JSON payload; its schema depends on `event_type`.
    pub payload: Vec<u8>,
}

impl RawEvent {
    /// Start building a raw event with the given type tags.
    ///
    /// Unset fields default to empty identifiers, sequence 0 and the Unix epoch.
    #[must_use]
    pub fn builder(
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
    ) -> RawEventBuilder {
        RawEventBuilder {
            event: Self {
                aggregate_id: AggregateId::new(""),
                aggregate_type: aggregate_type.into(),
                event_type: event_type.into(),
                instance_id: InstanceId::new(""),
                sequence: 0,
                previous_sequence: 0,
                creation_date: DateTime::<Utc>::UNIX_EPOCH,
                payload: Vec::new(),
            },
        }
    }

    /// Whether this event is of the kind named by `key`.
    #[must_use]
    pub fn is(&self, key: &EventKey) -> bool {
        key.matches(&self.aggregate_type, &self.event_type)
    }

    /// The payload-independent part of the event.
    #[must_use]
    pub fn header(&self) -> EventHeader {
        EventHeader {
            aggregate_id: self.aggregate_id.clone(),
            aggregate_type: self.aggregate_type.clone(),
            event_type: self.event_type.clone(),
            instance_id: self.instance_id.clone(),
            sequence: self.sequence,
            previous_sequence: self.previous_sequence,
            creation_date: self.creation_date,
        }
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawEvent {{ type: {}, aggregate: {}/{}, sequence: {} }}",
            self.event_type, self.aggregate_type, self.aggregate_id, self.sequence
        )
    }
}

/// Builder for [`RawEvent`], mostly used by tests and in-memory sources.
#[derive(Clone, Debug)]
pub struct RawEventBuilder {
    event: RawEvent,
}

impl RawEventBuilder {
    /// Set the aggregate id.
    #[must_use]
    pub fn aggregate_id(mut self, id: impl Into<AggregateId>) -> Self {
        self.event.aggregate_id = id.into();
        self
    }

    /// Set the instance id.
    #[must_use]
    pub fn instance_id(mut self, id: impl Into<InstanceId>) -> Self {
        self.event.instance_id = id.into();
        self
    }

    /// Set sequence and previous sequence.
    #[must_use]
    pub const fn sequence(mut self, sequence: u64, previous_sequence: u64) -> Self {
        self.event.sequence = sequence;
        self.event.previous_sequence = previous_sequence;
        self
    }

    /// Set the creation date.
    #[must_use]
    pub const fn creation_date(mut self, creation_date: DateTime<Utc>) -> Self {
        self.event.creation_date = creation_date;
        self
    }

    /// Set the JSON payload bytes.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.event.payload = payload.into();
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> RawEvent {
        self.event
    }
}

/// Decoded, payload-independent fields of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// Aggregate the event belongs to.
    pub aggregate_id: AggregateId,
    /// Aggregate type tag.
    pub aggregate_type: String,
    /// Event type tag.
    pub event_type: String,
    /// Instance (tenant) the aggregate lives in.
    pub instance_id: InstanceId,
    /// Sequence of this event.
    pub sequence: u64,
    /// Sequence observed by the writer before this event.
    pub previous_sequence: u64,
    /// When the event was appended to the log.
    pub creation_date: DateTime<Utc>,
}

impl EventHeader {
    /// The `(aggregate type, event type)` pair of this event, rendered for diagnostics.
    #[must_use]
    pub fn kind(&self) -> String {
        format!("{}/{}", self.aggregate_type, self.event_type)
    }
}

/// Payload schema of exactly one event type.
///
/// Implementors name the type tags they decode; [`Event::map`] refuses raw events
/// carrying other tags, so a mapper never interprets a foreign payload.
pub trait EventMapper: DeserializeOwned {
    /// Aggregate type tag this payload belongs to.
    const AGGREGATE_TYPE: &'static str;

    /// Event type tag this payload belongs to.
    const EVENT_TYPE: &'static str;

    /// The key naming this event kind.
    #[must_use]
    fn key() -> EventKey {
        EventKey::new(Self::AGGREGATE_TYPE, Self::EVENT_TYPE)
    }
}

/// A decoded event: header plus typed payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event<P> {
    /// Payload-independent fields.
    pub header: EventHeader,
    /// Typed payload.
    pub payload: P,
}

impl<P> Event<P> {
    /// Assemble an event from an already decoded header and payload.
    #[must_use]
    pub const fn new(header: EventHeader, payload: P) -> Self {
        Self { header, payload }
    }
}

impl<P: EventMapper> Event<P> {
    /// Decode a raw event into this event type.
    ///
    /// An empty payload is decoded as `{}` so payload-less events map to
    /// structs whose fields are all optional.
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::InvalidArgument`] if the raw event carries other type tags
    /// - [`ProjectionError::Deserialization`] if the payload does not match `P`
    pub fn map(raw: &RawEvent) -> Result<Self> {
        if !raw.is(&P::key()) {
            return Err(ProjectionError::invalid_argument(
                P::key().to_string(),
                format!("{}/{}", raw.aggregate_type, raw.event_type),
            ));
        }

        let bytes: &[u8] = if raw.payload.is_empty() {
            b"{}"
        } else {
            &raw.payload
        };

        let payload = serde_json::from_slice(bytes).map_err(|e| {
            ProjectionError::Deserialization {
                event_type: raw.event_type.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            header: raw.header(),
            payload,
        })
    }
}

/// A closed set of event kinds that can be decoded from raw events.
///
/// Implemented by the tagged union a projection consumes; the consumption loop
/// uses it to decode before dispatching.
pub trait DecodeEvent: Sized + Send + Sync {
    /// Decode a raw event by routing on its type tags.
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::UnknownEventType`] if no mapper handles the tags
    /// - [`ProjectionError::Deserialization`] if the payload does not decode
    fn decode(raw: &RawEvent) -> Result<Self>;

    /// The header of the decoded event.
    fn header(&self) -> &EventHeader;
}
