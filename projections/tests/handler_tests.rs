//! Consumption loop tests against the in-memory executer and event source.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use futures::StreamExt;
use iam_projection_core::aggregate::EventKey;
use iam_projection_core::error::ProjectionError;
use iam_projection_core::event_source::{EventSource, EventStream};
use iam_projection_core::event::RawEvent;
use iam_projection_core::statement::Value;
use iam_projection_core::watermark::WatermarkScope;
use iam_projection_testing::properties::at_least_once;
use iam_projection_testing::{
    EventLog, InMemoryEventSource, InMemoryExecuter, init_test_tracing, test_event,
};
use iam_projections::{
    Catalog, InstanceProjection, OrgDomainProjection, Outcome, ProjectionHandler, RetryPolicy,
};
use proptest::prelude::*;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const INSTANCE: &str = "instance-1";
const ORG: &str = "org-1";
const INSTANCES: &str = "projections.instances";
const ORG_DOMAINS: &str = "projections.org_domains";

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::default())
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::builder()
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build()
}

fn domains(
    source: &InMemoryEventSource,
    executer: &Arc<InMemoryExecuter>,
) -> (ProjectionHandler<OrgDomainProjection>, watch::Sender<bool>) {
    let (handler, shutdown) = ProjectionHandler::new(
        OrgDomainProjection::new(catalog()),
        Arc::new(source.clone()),
        executer.clone(),
    );
    (handler.with_retry_policy(fast_retry()), shutdown)
}

fn instances(
    source: &InMemoryEventSource,
    executer: &Arc<InMemoryExecuter>,
) -> (ProjectionHandler<InstanceProjection>, watch::Sender<bool>) {
    let (handler, shutdown) = ProjectionHandler::new(
        InstanceProjection::new(catalog()),
        Arc::new(source.clone()),
        executer.clone(),
    );
    (handler.with_retry_policy(fast_retry()), shutdown)
}

fn domain_log() -> EventLog {
    EventLog::new(INSTANCE)
        .push("instance", INSTANCE, "instance.added", json!({"name": "Acme"}))
        .push("org", ORG, "org.domain.added", json!({"domain": "a.com"}))
        .push("org", ORG, "org.domain.added", json!({"domain": "b.com"}))
        .push(
            "org",
            ORG,
            "org.domain.verification.added",
            json!({"domain": "a.com", "validationType": 2}),
        )
        .push("org", ORG, "org.domain.verified", json!({"domain": "a.com"}))
        .push("org", ORG, "org.domain.primary.set", json!({"domain": "a.com"}))
}

fn domain(executer: &InMemoryExecuter, name: &str) -> iam_projection_testing::Row {
    let rows = executer.rows_where(ORG_DOMAINS, "domain", name);
    assert_eq!(rows.len(), 1, "expected exactly one row for {name}");
    rows.into_iter().next().unwrap()
}

fn org_scope() -> WatermarkScope {
    WatermarkScope::new("org_domains", "org", INSTANCE)
}

#[tokio::test]
async fn builds_org_domains_from_the_log() {
    init_test_tracing();
    let events = domain_log()
        .push("org", ORG, "org.domain.primary.set", json!({"domain": "b.com"}))
        .build();
    let source = InMemoryEventSource::with_events(events);
    let executer = Arc::new(InMemoryExecuter::new());

    let (handler, _shutdown) = domains(&source, &executer);
    handler.run().await.unwrap();

    let a = domain(&executer, "a.com");
    assert_eq!(a["is_verified"], Value::Bool(true));
    assert_eq!(a["is_primary"], Value::Bool(false));
    assert_eq!(a["validation_type"], Value::SmallInt(2));
    assert_eq!(a["sequence"], Value::UInt(7));

    let b = domain(&executer, "b.com");
    assert_eq!(b["is_primary"], Value::Bool(true));
    assert_eq!(b["is_verified"], Value::Bool(false));

    assert_eq!(executer.watermark(&org_scope()), Some(7));
    assert_eq!(
        executer.watermark(&WatermarkScope::new("org_domains", "instance", INSTANCE)),
        Some(1)
    );
}

#[tokio::test]
async fn redelivered_event_is_skipped() {
    let executer = Arc::new(InMemoryExecuter::new());
    let (handler, _shutdown) = domains(&InMemoryEventSource::new(), &executer);
    let event = test_event("org", "org.domain.added", json!({"domain": "domain.new"}));

    assert_eq!(
        handler.process(&event).await.unwrap(),
        Outcome::Applied { statements: 1 }
    );
    assert_eq!(
        handler.process(&event).await.unwrap(),
        Outcome::Skipped { watermark: 15 }
    );

    assert_eq!(executer.rows(ORG_DOMAINS).len(), 1);
    assert_eq!(executer.commits(), 1);
}

#[tokio::test]
async fn replay_after_restart_changes_nothing() {
    let source = InMemoryEventSource::with_events(domain_log().build());
    let executer = Arc::new(InMemoryExecuter::new());

    let (first, _shutdown) = domains(&source, &executer);
    first.run().await.unwrap();
    let rows = executer.rows(ORG_DOMAINS);
    let commits = executer.commits();

    let (second, _shutdown) = domains(&source, &executer);
    second.run().await.unwrap();

    assert_eq!(executer.rows(ORG_DOMAINS), rows);
    assert_eq!(executer.commits(), commits);
}

#[tokio::test]
async fn crash_during_primary_swap_applies_neither_statement() {
    let log = domain_log();
    let swap = log
        .clone()
        .push("org", ORG, "org.domain.primary.set", json!({"domain": "b.com"}))
        .build()
        .pop()
        .unwrap();
    let source = InMemoryEventSource::with_events(log.build());
    let executer = Arc::new(InMemoryExecuter::new());

    let (setup, _setup_shutdown) = domains(&source, &executer);
    setup.run().await.unwrap();
    let (handler, _shutdown) = domains(&source, &executer);

    executer.crash_after_statements(1);
    let result = handler.process(&swap).await;

    assert!(matches!(result, Err(ProjectionError::Execution(_))));
    assert_eq!(domain(&executer, "a.com")["is_primary"], Value::Bool(true));
    assert_eq!(domain(&executer, "b.com")["is_primary"], Value::Bool(false));
    assert_eq!(executer.watermark(&org_scope()), Some(6));

    assert_eq!(
        handler.process(&swap).await.unwrap(),
        Outcome::Applied { statements: 2 }
    );
    assert_eq!(domain(&executer, "a.com")["is_primary"], Value::Bool(false));
    assert_eq!(domain(&executer, "b.com")["is_primary"], Value::Bool(true));
}

#[tokio::test]
async fn unsubscribed_event_only_advances_watermark() {
    let executer = Arc::new(InMemoryExecuter::new());
    let (handler, _shutdown) = domains(&InMemoryEventSource::new(), &executer);
    let event = EventLog::new(INSTANCE)
        .push("instance", INSTANCE, "instance.added", json!({"name": "Acme"}))
        .build()
        .remove(0);

    assert_eq!(handler.process(&event).await.unwrap(), Outcome::Ignored);
    assert!(executer.rows(ORG_DOMAINS).is_empty());
    assert_eq!(
        executer.watermark(&WatermarkScope::new("org_domains", "instance", INSTANCE)),
        Some(1)
    );
}

#[tokio::test]
async fn missing_predecessor_is_a_sequence_gap() {
    let executer = Arc::new(InMemoryExecuter::new());
    let event = test_event("org", "org.domain.added", json!({"domain": "domain.new"}));

    let (checking, _shutdown) = domains(&InMemoryEventSource::new(), &executer);
    let result = checking
        .with_sequence_gap_checking(true)
        .process(&event)
        .await;
    assert!(matches!(
        result,
        Err(ProjectionError::SequenceGap {
            watermark: 0,
            sequence: 15,
            previous_sequence: 10,
            ..
        })
    ));
    assert!(executer.rows(ORG_DOMAINS).is_empty());

    let (lenient, _shutdown) = domains(&InMemoryEventSource::new(), &executer);
    assert_eq!(
        lenient.process(&event).await.unwrap(),
        Outcome::Applied { statements: 1 }
    );
}

#[tokio::test]
async fn sequence_gap_stops_the_loop() {
    let mut events = domain_log().build();
    events.remove(2);
    let source = InMemoryEventSource::with_events(events);
    let executer = Arc::new(InMemoryExecuter::new());

    let (handler, _shutdown) = domains(&source, &executer);
    let result = handler.with_sequence_gap_checking(true).run().await;

    assert!(matches!(result, Err(ProjectionError::SequenceGap { .. })));
    assert_eq!(executer.watermark(&org_scope()), Some(2));
}

/// Delivers only the events matching a subscription key.
struct SubscribedOnly(InMemoryEventSource);

impl EventSource for SubscribedOnly {
    fn subscribe(
        &self,
        keys: &[EventKey],
    ) -> Pin<Box<dyn Future<Output = iam_projection_core::Result<EventStream>> + Send + '_>> {
        let keys = keys.to_vec();
        Box::pin(async move {
            let events = self.0.subscribe(&keys).await?;
            let matching = events.filter(move |item| {
                let keep = match item {
                    Ok(event) => keys.iter().any(|key| event.is(key)),
                    Err(_) => true,
                };
                std::future::ready(keep)
            });
            Ok(Box::pin(matching) as EventStream)
        })
    }
}

#[tokio::test]
async fn subscribed_events_only_source_is_consumed_by_default() {
    let events = EventLog::new(INSTANCE)
        .push("org", ORG, "org.added", json!({"name": "Acme"}))
        .push("org", ORG, "org.domain.added", json!({"domain": "a.com"}))
        .build();
    let source = SubscribedOnly(InMemoryEventSource::with_events(events));
    let executer = Arc::new(InMemoryExecuter::new());

    let (handler, _shutdown) = ProjectionHandler::new(
        OrgDomainProjection::new(catalog()),
        Arc::new(source),
        executer.clone(),
    );
    handler.run().await.unwrap();

    assert_eq!(domain(&executer, "a.com")["sequence"], Value::UInt(2));
    assert_eq!(executer.watermark(&org_scope()), Some(2));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let source = InMemoryEventSource::with_events(domain_log().build());
    let executer = Arc::new(InMemoryExecuter::new());
    executer.fail_next(2);
    executer.fail_watermark_reads(1);

    let (handler, _shutdown) = domains(&source, &executer);
    handler.run().await.unwrap();

    assert_eq!(executer.rows(ORG_DOMAINS).len(), 2);
    assert_eq!(executer.commits(), 6);
    assert_eq!(executer.watermark(&org_scope()), Some(6));
}

#[tokio::test]
async fn exhausted_retry_budget_stops_the_loop() {
    let source = InMemoryEventSource::with_events(domain_log().build());
    let executer = Arc::new(InMemoryExecuter::new());
    executer.fail_next(10);

    let (handler, _shutdown) = domains(&source, &executer);
    let handler = handler.with_retry_policy(
        RetryPolicy::builder()
            .max_retries(2)
            .initial_delay(Duration::from_millis(1))
            .build(),
    );

    let result = handler.run().await;
    assert!(matches!(result, Err(ProjectionError::Execution(_))));
    assert_eq!(executer.commits(), 0);
}

#[tokio::test]
async fn malformed_payload_stops_the_loop() {
    let events = EventLog::new(INSTANCE)
        .push("org", ORG, "org.domain.added", json!({"domain": "a.com"}))
        .push("org", ORG, "org.domain.verified", json!({"domain": 42}))
        .push("org", ORG, "org.domain.added", json!({"domain": "b.com"}))
        .build();
    let source = InMemoryEventSource::with_events(events);
    let executer = Arc::new(InMemoryExecuter::new());

    let (handler, _shutdown) = domains(&source, &executer);
    let result = handler.run().await;

    assert!(matches!(
        result,
        Err(ProjectionError::Deserialization { .. })
    ));
    assert_eq!(executer.rows(ORG_DOMAINS).len(), 1);
    assert_eq!(executer.watermark(&org_scope()), Some(1));
}

#[tokio::test]
async fn source_errors_do_not_stop_the_loop() {
    let mut events = domain_log().build().into_iter();
    let source = InMemoryEventSource::new();
    source.extend(events.by_ref().take(2));
    source.push_error("connection reset");
    source.extend(events);
    let executer = Arc::new(InMemoryExecuter::new());

    let (handler, _shutdown) = domains(&source, &executer);
    handler.run().await.unwrap();

    assert_eq!(executer.rows(ORG_DOMAINS).len(), 2);
    assert_eq!(executer.watermark(&org_scope()), Some(6));
}

#[tokio::test]
async fn removed_instance_cascades_across_projections() {
    let events = domain_log()
        .push("instance", INSTANCE, "instance.removed", json!({"name": "Acme"}))
        .build();
    let source = InMemoryEventSource::with_events(events);
    let executer = Arc::new(InMemoryExecuter::new());

    let (domain_handler, _d) = domains(&source, &executer);
    let (instance_handler, _i) = instances(&source, &executer);
    let (domains_result, instances_result) =
        tokio::join!(domain_handler.run(), instance_handler.run());
    domains_result.unwrap();
    instances_result.unwrap();

    assert!(executer.rows(ORG_DOMAINS).is_empty());
    assert!(executer.rows(INSTANCES).is_empty());
    assert_eq!(
        executer.watermark(&WatermarkScope::new("instances", "instance", INSTANCE)),
        Some(7)
    );
}

#[tokio::test]
async fn projections_run_concurrently_until_shutdown() {
    let source = InMemoryEventSource::live();
    let executer = Arc::new(InMemoryExecuter::new());

    let (domain_handler, stop_domains) = domains(&source, &executer);
    let (instance_handler, stop_instances) = instances(&source, &executer);
    let domain_task = domain_handler.spawn();
    let instance_task = instance_handler.spawn();

    let log = domain_log()
        .push("instance", INSTANCE, "instance.default.language.set", json!({"language": "de"}))
        .build();
    source.extend(log);

    let instance_scope = WatermarkScope::new("instances", "instance", INSTANCE);
    tokio::time::timeout(Duration::from_secs(5), async {
        while executer.watermark(&org_scope()) != Some(6)
            || executer.watermark(&instance_scope) != Some(7)
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("projections should catch up");

    stop_domains.send(true).unwrap();
    stop_instances.send(true).unwrap();
    domain_task.await.unwrap().unwrap();
    instance_task.await.unwrap().unwrap();

    let instance = executer.rows(INSTANCES).pop().unwrap();
    assert_eq!(instance["name"], Value::Text("Acme".into()));
    assert_eq!(instance["default_language"], Value::Text("de".into()));
    assert_eq!(instance["sequence"], Value::UInt(7));
}

#[tokio::test]
async fn shutdown_interrupts_retry_backoff() {
    let source = InMemoryEventSource::with_events(domain_log().build());
    let executer = Arc::new(InMemoryExecuter::new());
    executer.fail_next(usize::MAX);

    let (handler, shutdown) = domains(&source, &executer);
    let task = handler
        .with_retry_policy(
            RetryPolicy::builder()
                .initial_delay(Duration::from_secs(60))
                .build(),
        )
        .spawn();

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("handler should stop while waiting to retry");
    result.unwrap().unwrap();
    assert_eq!(executer.commits(), 0);
}

fn replay(deliveries: Vec<RawEvent>) -> (Vec<iam_projection_testing::Row>, Option<u64>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async move {
        let executer = Arc::new(InMemoryExecuter::new());
        let (handler, _shutdown) = domains(&InMemoryEventSource::with_events(deliveries), &executer);
        handler.run().await.unwrap();
        (executer.rows(ORG_DOMAINS), executer.watermark(&org_scope()))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn at_least_once_delivery_matches_exactly_once(
        deliveries in at_least_once(
            domain_log()
                .push("org", ORG, "org.domain.primary.set", json!({"domain": "b.com"}))
                .push("org", ORG, "org.domain.removed", json!({"domain": "a.com"}))
                .build()
        )
    ) {
        let exactly_once = domain_log()
            .push("org", ORG, "org.domain.primary.set", json!({"domain": "b.com"}))
            .push("org", ORG, "org.domain.removed", json!({"domain": "a.com"}))
            .build();

        let (expected_rows, expected_watermark) = replay(exactly_once);
        let (rows, watermark) = replay(deliveries);

        prop_assert_eq!(rows, expected_rows);
        prop_assert_eq!(watermark, expected_watermark);
        prop_assert_eq!(watermark, Some(8));
    }
}
