//! Reducers and projections.
//!
//! # Overview
//!
//! A **reducer** is a pure function from one typed event to the ordered statements
//! that keep a projection table consistent with it. A **projection** owns a table,
//! the set of event kinds it reacts to, and an exhaustive dispatch from its event
//! union to the matching reducer.
//!
//! ```text
//! RawEvent ──decode──▶ DomainEvent ──reduce──▶ StatementBatch ──execute──▶ table
//!                       (closed union)          (1..n statements, atomic)
//! ```
//!
//! Reducers never read projection state. A statement may still reference the
//! current state of other rows through its conditions (for example "whichever row
//! currently holds the primary flag"); the store evaluates those when executing.
//!
//! ## Example
//!
//! ```ignore
//! impl Projection for InstanceProjection {
//!     type Event = DomainEvent;
//!
//!     fn name(&self) -> &str {
//!         "instances"
//!     }
//!
//!     fn subscriptions(&self) -> &[EventKey] {
//!         &SUBSCRIPTIONS
//!     }
//!
//!     fn reduce(&self, event: &DomainEvent) -> Result<Option<StatementBatch>> {
//!         match event {
//!             DomainEvent::InstanceAdded(_) => self.reduce_added(event).map(Some),
//!             // every other kind is listed explicitly and ignored
//!             DomainEvent::OrgDomainAdded(_) => Ok(None),
//!         }
//!     }
//! }
//! ```

use crate::aggregate::EventKey;
use crate::error::Result;
use crate::event::{DecodeEvent, RawEvent};
use crate::statement::StatementBatch;

/// A pure mapping from one event kind to the statements it causes.
///
/// Reducers are deterministic: the same event always yields the same batch. A
/// reducer handed an event of a kind it does not handle returns
/// [`ProjectionError::InvalidArgument`](crate::error::ProjectionError::InvalidArgument)
/// and no statements.
pub trait Reducer<E>: Send + Sync {
    /// Build the statements for `event`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidArgument`](crate::error::ProjectionError::InvalidArgument)
    /// if `event` is not the kind this reducer handles.
    fn reduce(&self, event: &E) -> Result<StatementBatch>;
}

/// A read model maintained incrementally from events.
///
/// Projections are defined once at process start. Their backing tables are
/// created by schema management before the consumption loop runs.
pub trait Projection: Send + Sync {
    /// The closed union of event kinds this projection can be handed.
    type Event: DecodeEvent;

    /// Unique projection name; used for watermarks and logging.
    fn name(&self) -> &str;

    /// The event kinds this projection reacts to.
    ///
    /// Every key listed here must dispatch to a reducer in [`Projection::reduce`].
    fn subscriptions(&self) -> &[EventKey];

    /// Dispatch an event to its reducer.
    ///
    /// Returns `Ok(None)` for kinds this projection does not react to.
    ///
    /// # Errors
    ///
    /// Propagates the reducer's error.
    fn reduce(&self, event: &Self::Event) -> Result<Option<StatementBatch>>;

    /// Whether a raw event is one of this projection's subscriptions.
    fn handles(&self, raw: &RawEvent) -> bool {
        self.subscriptions().iter().any(|key| raw.is(key))
    }
}
