//! Tests for the in-memory executer and event source working together

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use futures::StreamExt;
use iam_projection_core::aggregate::EventKey;
use iam_projection_core::error::ProjectionError;
use iam_projection_core::executer::Executer;
use iam_projection_core::event_source::EventSource;
use iam_projection_core::statement::{Column, Condition, Statement, StatementBatch, Value};
use iam_projection_core::watermark::WatermarkScope;
use iam_projection_testing::{EventLog, InMemoryEventSource, InMemoryExecuter};
use serde_json::json;

const TABLE: &str = "projections.org_domains";
const KEYS: [EventKey; 1] = [EventKey::new("org", "org.domain.added")];

fn log() -> EventLog {
    EventLog::new("instance-1")
        .push("org", "org-1", "org.domain.added", json!({"domain": "a.com"}))
        .push("instance", "instance-1", "instance.added", json!({"name": "n"}))
        .push("org", "org-1", "org.domain.added", json!({"domain": "b.com"}))
}

fn insert(domain: &str) -> Statement {
    Statement::insert(
        TABLE,
        vec![
            Column::new("org_id", "org-1"),
            Column::new("domain", domain),
            Column::new("is_primary", false),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn source_events_drive_executer_state() {
    let source = InMemoryEventSource::with_events(log().build());
    let executer = InMemoryExecuter::new();

    let mut stream = source.subscribe(&KEYS).await.unwrap();
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&event.payload).unwrap();
        let domain = payload["domain"].as_str().unwrap().to_string();
        let batch = StatementBatch::single(event.header(), insert(&domain));
        executer.execute("org_domains", &batch).await.unwrap();
    }

    assert_eq!(executer.rows(TABLE).len(), 2);
    assert_eq!(executer.commits(), 2);
    let scope = WatermarkScope::new("org_domains", "org", "instance-1");
    assert_eq!(executer.current_sequence(&scope).await.unwrap(), Some(3));
    let other = WatermarkScope::new("org_domains", "instance", "instance-1");
    assert_eq!(executer.current_sequence(&other).await.unwrap(), None);
}

#[tokio::test]
async fn update_and_delete_follow_conditions() {
    let events = log().build();
    let executer = InMemoryExecuter::new();

    let batch = StatementBatch::new(
        events[0].header(),
        vec![
            insert("a.com"),
            insert("b.com"),
            Statement::update(
                TABLE,
                vec![Column::new("is_primary", true)],
                vec![Condition::eq("domain", "b.com")],
            )
            .unwrap(),
            Statement::delete(TABLE, vec![Condition::eq("domain", "a.com")]).unwrap(),
        ]
        .into(),
    );
    executer.execute("org_domains", &batch).await.unwrap();

    let rows = executer.rows(TABLE);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["domain"], Value::Text("b.com".into()));
    assert_eq!(rows[0]["is_primary"], Value::Bool(true));
    assert_eq!(executer.rows_where(TABLE, "is_primary", false).len(), 0);
}

#[tokio::test]
async fn unique_key_violation_discards_the_batch() {
    let events = log().build();
    let executer = InMemoryExecuter::new().with_unique_key(TABLE, &["org_id", "domain"]);

    executer
        .execute("org_domains", &StatementBatch::single(events[0].header(), insert("a.com")))
        .await
        .unwrap();

    let duplicate = StatementBatch::new(
        events[2].header(),
        vec![insert("c.com"), insert("a.com")].into(),
    );
    let result = executer.execute("org_domains", &duplicate).await;

    assert!(matches!(result, Err(ProjectionError::Execution(_))));
    assert_eq!(executer.rows(TABLE).len(), 1);
    let scope = WatermarkScope::new("org_domains", "org", "instance-1");
    assert_eq!(executer.watermark(&scope), Some(1));
}

#[tokio::test]
async fn live_source_streams_later_appends() {
    let source = InMemoryEventSource::live();
    let mut stream = source.subscribe(&KEYS).await.unwrap();

    let events = log().build();
    source.extend(events.clone());
    source.push_error("broker unavailable");

    let first = stream.next().await.unwrap().unwrap();
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!((first.sequence, second.sequence), (1, 3));
    assert!(matches!(
        stream.next().await,
        Some(Err(ProjectionError::EventSource(_)))
    ));
    assert_eq!(source.len(), 4);
}
