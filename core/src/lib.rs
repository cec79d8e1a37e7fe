//! # IAM Projection Core
//!
//! Core types and traits of the read-model reduction engine.
//!
//! Write-side commands append immutable events to a log. This crate describes how
//! those events become rows in denormalized projection tables:
//!
//! - **Event model**: [`RawEvent`] as stored, [`Event<P>`] as decoded by an [`EventMapper`]
//! - **Statements**: declarative insert/update/delete mutations ([`Statement`])
//! - **Reducers**: pure functions from one event to an ordered [`StatementBatch`]
//! - **Projections**: a table plus an exhaustive dispatch from events to reducers
//! - **Executers**: apply a batch and advance the sequence watermark atomically
//! - **Watermarks**: make at-least-once delivery idempotent
//!
//! ## Architecture Principles
//!
//! - Reducers are pure: no I/O, no reads of projection state
//! - Event kinds form a closed set per projection; dispatch is an exhaustive `match`
//! - One event, one transaction: all of its statements or none of them
//! - Storage and transport sit behind dyn-compatible traits
//!
//! ## Example
//!
//! ```ignore
//! use iam_projection_core::prelude::*;
//!
//! fn reduce_domain_removed(event: &Event<DomainRemoved>) -> Result<StatementBatch> {
//!     let statement = Statement::delete(
//!         "projections.org_domains",
//!         vec![
//!             Condition::eq("domain", event.payload.domain.as_str()),
//!             Condition::eq("org_id", event.header.aggregate_id.as_str()),
//!             Condition::eq("instance_id", event.header.instance_id.as_str()),
//!         ],
//!     )?;
//!     Ok(StatementBatch::single(event.header.clone(), statement))
//! }
//! ```

pub mod aggregate;
pub mod error;
pub mod event;
pub mod event_source;
pub mod executer;
pub mod projection;
pub mod statement;
pub mod watermark;

pub use aggregate::{AggregateId, EventKey, InstanceId, ParseIdError};
pub use error::{ProjectionError, Result};
pub use event::{DecodeEvent, Event, EventHeader, EventMapper, RawEvent, RawEventBuilder};
pub use event_source::{EventSource, EventStream};
pub use executer::Executer;
pub use projection::{Projection, Reducer};
pub use statement::{
    Column, Condition, Operation, Operator, Statement, StatementBatch, Statements, Value,
};
pub use watermark::{Admission, WatermarkScope, admit};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Everything a projection module usually imports.
pub mod prelude {
    pub use crate::aggregate::{AggregateId, EventKey, InstanceId};
    pub use crate::error::{ProjectionError, Result};
    pub use crate::event::{DecodeEvent, Event, EventHeader, EventMapper, RawEvent};
    pub use crate::projection::{Projection, Reducer};
    pub use crate::statement::{Column, Condition, Statement, StatementBatch, Statements, Value};
}
