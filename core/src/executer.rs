//! Executer abstraction: applies statement batches to projection storage.
//!
//! An executer commits every statement of a batch, in order, together with the
//! watermark advance for the batch's event. Either all of it becomes visible or
//! none of it does; a failed batch leaves the table and the watermark untouched
//! so the event can be reprocessed.
//!
//! # Implementations
//!
//! - `PostgresExecuter` (in `iam-projections`): one transaction per batch
//! - `InMemoryExecuter` (in `iam-projection-testing`): copy-on-write tables with failure injection
//!
//! # Dyn Compatibility
//!
//! Like the event source, this trait returns `Pin<Box<dyn Future>>` so it can be
//! shared as `Arc<dyn Executer>` between projection handlers.

use crate::error::Result;
use crate::statement::StatementBatch;
use crate::watermark::WatermarkScope;
use std::future::Future;
use std::pin::Pin;

/// Applies statement batches and tracks per-scope watermarks.
pub trait Executer: Send + Sync {
    /// Highest sequence committed for `scope`, or `None` if nothing was committed yet.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Watermark`](crate::error::ProjectionError::Watermark)
    /// if the watermark store cannot be read.
    fn current_sequence<'a>(
        &'a self,
        scope: &'a WatermarkScope,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u64>>> + Send + 'a>>;

    /// Apply all statements of `batch` in order and advance the watermark of the
    /// batch's scope to its sequence, atomically.
    ///
    /// An empty batch only advances the watermark. The watermark never moves
    /// backwards.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Execution`](crate::error::ProjectionError::Execution)
    /// if any statement or the watermark update fails. Nothing is applied in that case.
    fn execute<'a>(
        &'a self,
        projection: &'a str,
        batch: &'a StatementBatch,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
