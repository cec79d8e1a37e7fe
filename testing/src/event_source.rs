//! In-memory event log for driving projection handlers in tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use iam_projection_core::aggregate::EventKey;
use iam_projection_core::error::{ProjectionError, Result};
use iam_projection_core::event::RawEvent;
use iam_projection_core::event_source::{EventSource, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

#[derive(Clone, Debug)]
enum Entry {
    Event(RawEvent),
    Error(String),
}

/// In-memory event source.
///
/// Subscriptions replay the log from the start and deliver every event of the
/// subscribed aggregate types, in append order. Injected errors are delivered
/// in place as [`ProjectionError::EventSource`] items.
///
/// By default a stream ends once it has caught up with the log. A source built
/// with [`InMemoryEventSource::live`] keeps streams open and delivers later
/// appends as they happen.
///
/// # Example
///
/// ```
/// use iam_projection_testing::{InMemoryEventSource, test_event};
///
/// let source = InMemoryEventSource::new();
/// source.append(test_event("org", "org.removed", serde_json::json!({})));
/// assert_eq!(source.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryEventSource {
    log: Arc<RwLock<Vec<Entry>>>,
    appended: Arc<watch::Sender<usize>>,
    live: bool,
}

impl InMemoryEventSource {
    /// Create an empty source whose streams end when caught up.
    #[must_use]
    pub fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            appended: Arc::new(appended),
            live: false,
        }
    }

    /// Create an empty source whose streams stay open for later appends.
    #[must_use]
    pub fn live() -> Self {
        Self {
            live: true,
            ..Self::new()
        }
    }

    /// Create a source holding `events`.
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = RawEvent>) -> Self {
        let source = Self::new();
        source.extend(events);
        source
    }

    /// Append one event to the log.
    pub fn append(&self, event: RawEvent) {
        self.push(Entry::Event(event));
    }

    /// Append several events to the log.
    pub fn extend(&self, events: impl IntoIterator<Item = RawEvent>) {
        for event in events {
            self.append(event);
        }
    }

    /// Append a transport failure; every subscriber receives it at this position.
    pub fn push_error(&self, message: impl Into<String>) {
        self.push(Entry::Error(message.into()));
    }

    /// Number of entries in the log, errors included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.read().unwrap().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.read().unwrap().is_empty()
    }

    fn push(&self, entry: Entry) {
        let len = {
            let mut log = self.log.write().unwrap();
            log.push(entry);
            log.len()
        };
        self.appended.send_replace(len);
    }
}

impl Default for InMemoryEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for InMemoryEventSource {
    fn subscribe(
        &self,
        keys: &[EventKey],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream>> + Send + '_>> {
        let mut aggregate_types: Vec<&'static str> =
            keys.iter().map(|key| key.aggregate_type).collect();
        aggregate_types.sort_unstable();
        aggregate_types.dedup();

        let log = Arc::clone(&self.log);
        let mut appended = self.appended.subscribe();
        let live = self.live;

        Box::pin(async move {
            let stream = async_stream::stream! {
                let mut position = 0;
                loop {
                    appended.borrow_and_update();
                    let next = log.read().unwrap().get(position).cloned();
                    match next {
                        Some(Entry::Event(event)) => {
                            position += 1;
                            if aggregate_types.contains(&event.aggregate_type.as_str()) {
                                yield Ok(event);
                            }
                        }
                        Some(Entry::Error(message)) => {
                            position += 1;
                            yield Err(ProjectionError::EventSource(message));
                        }
                        None if live => {
                            if appended.changed().await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_event;
    use futures::StreamExt;

    const KEYS: [EventKey; 1] = [EventKey::new("org", "org.domain.added")];

    #[tokio::test]
    async fn delivers_whole_aggregate_type_in_order() {
        let source = InMemoryEventSource::with_events([
            test_event("org", "org.domain.added", serde_json::json!({})),
            test_event("instance", "instance.added", serde_json::json!({})),
            test_event("org", "org.removed", serde_json::json!({})),
        ]);

        let events: Vec<_> = source
            .subscribe(&KEYS)
            .await
            .unwrap()
            .map(|e| e.unwrap().event_type)
            .collect()
            .await;

        assert_eq!(events, ["org.domain.added", "org.removed"]);
    }

    #[tokio::test]
    async fn injected_errors_are_delivered_in_place() {
        let source = InMemoryEventSource::new();
        source.push_error("broker unavailable");
        source.append(test_event("org", "org.domain.added", serde_json::json!({})));

        let mut stream = source.subscribe(&KEYS).await.unwrap();
        assert!(matches!(
            stream.next().await,
            Some(Err(ProjectionError::EventSource(_)))
        ));
        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn live_source_delivers_later_appends() {
        let source = InMemoryEventSource::live();
        let mut stream = source.subscribe(&KEYS).await.unwrap();

        let writer = source.clone();
        tokio::spawn(async move {
            writer.append(test_event("org", "org.domain.added", serde_json::json!({})));
        });

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(matches!(event, Some(Ok(_))));
    }
}
