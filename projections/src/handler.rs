//! `ProjectionHandler`: the consumption loop of one projection.
//!
//! # Overview
//!
//! The handler subscribes to the projection's event kinds and, for every
//! delivered event:
//!
//! 1. loads the sequence watermark of the event's scope
//! 2. skips the event if it is at or below the watermark
//! 3. rejects it if its predecessor is missing (when gap checking is enabled)
//! 4. decodes it, dispatches it to the projection and commits the batch
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ EventSource │
//! └──────┬──────┘
//!        │ raw events (at-least-once, log order)
//!        ▼
//! ┌───────────────────┐     ┌────────────┐
//! │ ProjectionHandler │────▶│ Projection │  decode + reduce (pure)
//! └────────┬──────────┘     └────────────┘
//!          │ StatementBatch
//!          ▼
//! ┌─────────────┐
//! │  Executer   │  statements + watermark, one transaction
//! └─────────────┘
//! ```
//!
//! Each projection runs its own handler; several handlers run concurrently on the
//! Tokio runtime via [`ProjectionHandler::spawn`]. A handler is cancelable between
//! events and between commit attempts, never during a commit.
//!
//! # Example
//!
//! ```ignore
//! use iam_projections::*;
//!
//! let catalog = Arc::new(config.catalog());
//! let (handler, shutdown) = ProjectionHandler::new(
//!     OrgDomainProjection::new(Arc::clone(&catalog)),
//!     source,
//!     executer,
//! );
//! let task = handler.with_config(&config).spawn();
//!
//! // later
//! shutdown.send(true).ok();
//! task.await??;
//! ```

use crate::config::ProjectionConfig;
use crate::metrics::{
    COMMIT_DURATION, EVENTS_APPLIED, EVENTS_IGNORED, EVENTS_SKIPPED, EXECUTION_FAILURES,
};
use crate::retry::{Retried, RetryPolicy, retry_with_predicate};
use futures::StreamExt;
use iam_projection_core::error::{ProjectionError, Result};
use iam_projection_core::event::{DecodeEvent, RawEvent};
use iam_projection_core::event_source::EventSource;
use iam_projection_core::executer::Executer;
use iam_projection_core::projection::Projection;
use iam_projection_core::statement::StatementBatch;
use iam_projection_core::watermark::{Admission, WatermarkScope, admit};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What happened to one delivered event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Reduced and committed.
    Applied {
        /// Number of statements committed
        statements: usize,
    },
    /// At or below the watermark; nothing was done.
    Skipped {
        /// Watermark of the event's scope
        watermark: u64,
    },
    /// Not one of the projection's subscriptions; only the watermark advanced.
    Ignored,
}

/// Drives one projection from an event source into an executer.
pub struct ProjectionHandler<P>
where
    P: Projection,
{
    projection: Arc<P>,
    source: Arc<dyn EventSource>,
    executer: Arc<dyn Executer>,
    retry: RetryPolicy,
    check_sequence_gaps: bool,
    shutdown: watch::Receiver<bool>,
}

impl<P> ProjectionHandler<P>
where
    P: Projection + 'static,
{
    /// Create a new handler.
    ///
    /// Returns the handler and a shutdown sender. Send `true` to stop the loop
    /// after the event in progress. Dropping the sender leaves the loop running
    /// until its stream ends.
    #[must_use]
    pub fn new(
        projection: P,
        source: Arc<dyn EventSource>,
        executer: Arc<dyn Executer>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handler = Self {
            projection: Arc::new(projection),
            source,
            executer,
            retry: RetryPolicy::default(),
            check_sequence_gaps: false,
            shutdown: shutdown_rx,
        };

        (handler, shutdown_tx)
    }

    /// Apply the retry policy and gap checking setting of `config`.
    #[must_use]
    pub fn with_config(self, config: &ProjectionConfig) -> Self {
        self.with_retry_policy(config.retry.clone())
            .with_sequence_gap_checking(config.check_sequence_gaps)
    }

    /// Set the backoff for failed commits.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable sequence gap detection.
    ///
    /// Off by default. Only enable it for sources that deliver every event of
    /// the subscribed aggregate types, see [`EventSource::subscribe`].
    #[must_use]
    pub const fn with_sequence_gap_checking(mut self, enabled: bool) -> Self {
        self.check_sequence_gaps = enabled;
        self
    }

    /// The projection this handler drives.
    #[must_use]
    pub const fn projection(&self) -> &Arc<P> {
        &self.projection
    }

    /// Process one delivered event, once, without retrying.
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::Watermark`] / [`ProjectionError::Execution`] on storage failures
    /// - [`ProjectionError::SequenceGap`] if the event's predecessor is missing
    /// - [`ProjectionError::Deserialization`] / [`ProjectionError::UnknownEventType`] if it does not decode
    /// - any error of the dispatched reducer
    pub async fn process(&self, raw: &RawEvent) -> Result<Outcome> {
        let name = self.projection.name();
        let scope = WatermarkScope::new(name, raw.aggregate_type.clone(), raw.instance_id.clone());
        let watermark = self.executer.current_sequence(&scope).await?;

        match admit(
            watermark,
            raw.sequence,
            raw.previous_sequence,
            self.check_sequence_gaps,
        ) {
            Admission::Apply => {}
            Admission::AlreadyApplied { watermark } => {
                tracing::debug!(
                    projection = name,
                    aggregate_type = %raw.aggregate_type,
                    aggregate_id = %raw.aggregate_id,
                    instance_id = %raw.instance_id,
                    event_type = %raw.event_type,
                    sequence = raw.sequence,
                    watermark,
                    "Skipping already applied event"
                );
                metrics::counter!(EVENTS_SKIPPED, "projection" => name.to_string()).increment(1);
                return Ok(Outcome::Skipped { watermark });
            }
            Admission::Gap { watermark } => {
                return Err(ProjectionError::SequenceGap {
                    scope: scope.to_string(),
                    watermark,
                    sequence: raw.sequence,
                    previous_sequence: raw.previous_sequence,
                });
            }
        }

        let batch = if self.projection.handles(raw) {
            let event = P::Event::decode(raw)?;
            self.projection.reduce(&event)?
        } else {
            None
        };

        let Some(batch) = batch else {
            self.commit(&StatementBatch::noop(raw.header())).await?;
            tracing::debug!(
                projection = name,
                aggregate_type = %raw.aggregate_type,
                event_type = %raw.event_type,
                sequence = raw.sequence,
                "Ignored event"
            );
            metrics::counter!(EVENTS_IGNORED, "projection" => name.to_string()).increment(1);
            return Ok(Outcome::Ignored);
        };

        self.commit(&batch).await?;
        tracing::debug!(
            projection = name,
            aggregate_type = %raw.aggregate_type,
            aggregate_id = %raw.aggregate_id,
            instance_id = %raw.instance_id,
            event_type = %raw.event_type,
            sequence = raw.sequence,
            statements = batch.len(),
            "Applied event"
        );
        metrics::counter!(EVENTS_APPLIED, "projection" => name.to_string()).increment(1);
        Ok(Outcome::Applied {
            statements: batch.len(),
        })
    }

    async fn commit(&self, batch: &StatementBatch) -> Result<()> {
        let name = self.projection.name();
        let started = Instant::now();
        let result = self.executer.execute(name, batch).await;
        metrics::histogram!(COMMIT_DURATION, "projection" => name.to_string())
            .record(started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::counter!(EXECUTION_FAILURES, "projection" => name.to_string()).increment(1);
        }
        result
    }

    /// Process one event, retrying storage failures with backoff.
    ///
    /// Returns `Ok(None)` if shutdown was requested while waiting to retry.
    async fn process_with_retry(&self, raw: &RawEvent) -> Result<Option<Outcome>> {
        let outcome = retry_with_predicate(
            &self.retry,
            || self.process(raw),
            ProjectionError::is_retryable,
            shutdown_requested(self.shutdown.clone()),
        )
        .await?;

        Ok(match outcome {
            Retried::Completed(outcome) => Some(outcome),
            Retried::Cancelled => None,
        })
    }

    /// Run the consumption loop until shutdown or the end of the event stream.
    ///
    /// # Errors
    ///
    /// Returns the first error that retrying cannot fix: decoding, dispatch and
    /// sequence gap errors, a non-transient source error, or a storage error once
    /// the retry budget is spent. The failing event stays unapplied.
    #[allow(clippy::cognitive_complexity)]
    pub async fn run(self) -> Result<()> {
        let name = self.projection.name();
        tracing::info!(
            projection = name,
            subscriptions = self.projection.subscriptions().len(),
            check_sequence_gaps = self.check_sequence_gaps,
            "Starting projection handler"
        );

        let mut events = self
            .source
            .subscribe(self.projection.subscriptions())
            .await?;

        loop {
            tokio::select! {
                biased;

                () = shutdown_requested(self.shutdown.clone()) => {
                    tracing::info!(projection = name, "Shutdown signal received");
                    break;
                }

                next = events.next() => match next {
                    Some(Ok(raw)) => match self.process_with_retry(&raw).await {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            tracing::info!(
                                projection = name,
                                sequence = raw.sequence,
                                "Shutdown signal received while retrying"
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::error!(
                                projection = name,
                                error = %e,
                                aggregate_type = %raw.aggregate_type,
                                aggregate_id = %raw.aggregate_id,
                                instance_id = %raw.instance_id,
                                event_type = %raw.event_type,
                                sequence = raw.sequence,
                                "Failed to process event"
                            );
                            return Err(e);
                        }
                    },
                    Some(Err(e)) if e.is_retryable() => {
                        // Stream error - the source handles reconnection
                        tracing::warn!(projection = name, error = %e, "Error receiving event");
                    }
                    Some(Err(e)) => {
                        tracing::error!(projection = name, error = %e, "Event source failed");
                        return Err(e);
                    }
                    None => {
                        tracing::info!(projection = name, "Event stream ended");
                        break;
                    }
                },
            }
        }

        tracing::info!(projection = name, "Projection handler stopped");
        Ok(())
    }

    /// Run the consumption loop as a Tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

/// Resolves once `true` is sent. A dropped sender never resolves it.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
