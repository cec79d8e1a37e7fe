//! Event source abstraction for the consumption loop.
//!
//! The event log is owned by the write side. Projections only read from it, in
//! sequence order, with at-least-once delivery: after a restart a source may
//! replay events the projection already committed. Watermarks make that safe.

use crate::aggregate::EventKey;
use crate::error::Result;
use crate::event::RawEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

/// Stream of raw events in log order.
///
/// An `Err` item reports a transport failure; the stream may continue afterwards.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RawEvent>> + Send>>;

/// A readable event log.
pub trait EventSource: Send + Sync {
    /// Subscribe to the events named by `keys`.
    ///
    /// The stream yields at least every event matching one of `keys`, in
    /// ascending sequence order. Sources may also yield the other events of the
    /// keys' aggregate types; consumers ignore those. Only sources that do so
    /// can be combined with sequence gap detection, which is off by default.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::EventSource`](crate::error::ProjectionError::EventSource)
    /// if the subscription cannot be established.
    fn subscribe(
        &self,
        keys: &[EventKey],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream>> + Send + '_>>;
}
