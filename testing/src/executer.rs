//! In-memory executer for projection tests
//!
//! Provides a fast, deterministic stand-in for the `PostgreSQL` executer:
//! - [`InMemoryExecuter`]: row tables evaluated from statements, per-scope watermarks
//! - Failure injection to exercise retries and batch atomicity

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use iam_projection_core::error::{ProjectionError, Result};
use iam_projection_core::executer::Executer;
use iam_projection_core::statement::{Condition, Operation, Operator, Statement, StatementBatch, Value};
use iam_projection_core::watermark::WatermarkScope;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// One stored row: column name to value.
pub type Row = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    watermarks: HashMap<WatermarkScope, u64>,
    unique_keys: HashMap<String, Vec<&'static str>>,
    commits: usize,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next: usize,
    crash_after_statements: Option<usize>,
    watermark_failures: usize,
}

/// In-memory executer for fast, deterministic testing.
///
/// Each batch is applied to a copy of the tables; the copy replaces the live
/// tables only if every statement succeeded, so a failing batch leaves tables
/// and watermarks exactly as they were.
///
/// # Example
///
/// ```
/// use iam_projection_testing::{InMemoryExecuter, test_event};
/// use iam_projection_core::executer::Executer;
/// use iam_projection_core::statement::{Column, Statement, StatementBatch};
/// use iam_projection_core::watermark::WatermarkScope;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let executer = InMemoryExecuter::new();
/// let raw = test_event("instance", "instance.added", serde_json::json!({}));
/// let insert = Statement::insert("projections.instances", vec![Column::new("id", "instance-id")])?;
///
/// executer
///     .execute("instances", &StatementBatch::single(raw.header(), insert))
///     .await?;
///
/// assert_eq!(executer.rows("projections.instances").len(), 1);
/// let scope = WatermarkScope::for_event("instances", &raw.header());
/// assert_eq!(executer.current_sequence(&scope).await?, Some(15));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryExecuter {
    state: Arc<RwLock<State>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryExecuter {
    /// Create a new executer with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inserts that duplicate `columns` of an existing row in `table`,
    /// like a primary key would.
    #[must_use]
    pub fn with_unique_key(self, table: impl Into<String>, columns: &[&'static str]) -> Self {
        self.state
            .write()
            .unwrap()
            .unique_keys
            .insert(table.into(), columns.to_vec());
        self
    }

    /// Fail the next `count` batches before applying anything.
    pub fn fail_next(&self, count: usize) {
        self.faults.write().unwrap().fail_next = count;
    }

    /// Fail the next batch after `statements` of its statements were applied.
    ///
    /// Simulates a crash in the middle of a transaction.
    pub fn crash_after_statements(&self, statements: usize) {
        self.faults.write().unwrap().crash_after_statements = Some(statements);
    }

    /// Fail the next `count` watermark reads.
    pub fn fail_watermark_reads(&self, count: usize) {
        self.faults.write().unwrap().watermark_failures = count;
    }

    /// Current rows of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .read()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Rows of `table` whose `column` equals `value`.
    #[must_use]
    pub fn rows_where(&self, table: &str, column: &str, value: impl Into<Value>) -> Vec<Row> {
        let value = value.into();
        self.rows(table)
            .into_iter()
            .filter(|row| row.get(column) == Some(&value))
            .collect()
    }

    /// Watermark of `scope`, if anything was committed to it.
    #[must_use]
    pub fn watermark(&self, scope: &WatermarkScope) -> Option<u64> {
        self.state.read().unwrap().watermarks.get(scope).copied()
    }

    /// Number of successfully committed batches.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.state.read().unwrap().commits
    }

    fn take_fault(&self) -> (bool, Option<usize>) {
        let mut faults = self.faults.write().unwrap();
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return (true, None);
        }
        (false, faults.crash_after_statements.take())
    }
}

impl Executer for InMemoryExecuter {
    fn current_sequence<'a>(
        &'a self,
        scope: &'a WatermarkScope,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u64>>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut faults = self.faults.write().unwrap();
                if faults.watermark_failures > 0 {
                    faults.watermark_failures -= 1;
                    return Err(ProjectionError::Watermark(
                        "injected watermark failure".to_string(),
                    ));
                }
            }
            Ok(self.watermark(scope))
        })
    }

    fn execute<'a>(
        &'a self,
        projection: &'a str,
        batch: &'a StatementBatch,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let (fail, crash_after) = self.take_fault();
            if fail {
                return Err(ProjectionError::Execution(
                    "injected execution failure".to_string(),
                ));
            }

            let mut state = self.state.write().unwrap();
            let mut tables = state.tables.clone();

            for (applied, statement) in batch.statements().iter().enumerate() {
                if crash_after == Some(applied) {
                    return Err(ProjectionError::Execution(format!(
                        "injected crash after {applied} statements"
                    )));
                }
                apply(&mut tables, &state.unique_keys, statement)?;
            }

            let scope = WatermarkScope::for_event(projection, batch.header());
            let watermark = state.watermarks.entry(scope).or_insert(0);
            *watermark = (*watermark).max(batch.sequence());
            state.tables = tables;
            state.commits += 1;
            Ok(())
        })
    }
}

fn apply(
    tables: &mut HashMap<String, Vec<Row>>,
    unique_keys: &HashMap<String, Vec<&'static str>>,
    statement: &Statement,
) -> Result<()> {
    let rows = tables.entry(statement.table().to_string()).or_default();

    match statement.operation() {
        Operation::Insert => {
            let row: Row = statement
                .columns()
                .iter()
                .map(|c| (c.name.to_string(), c.value.clone()))
                .collect();
            if let Some(key) = unique_keys.get(statement.table()) {
                let duplicate = rows
                    .iter()
                    .any(|existing| key.iter().all(|k| existing.get(*k) == row.get(*k)));
                if duplicate {
                    return Err(ProjectionError::Execution(format!(
                        "duplicate key on {}",
                        statement.table()
                    )));
                }
            }
            rows.push(row);
        }
        Operation::Update => {
            for row in rows
                .iter_mut()
                .filter(|row| matches_all(row, statement.conditions()))
            {
                for column in statement.columns() {
                    row.insert(column.name.to_string(), column.value.clone());
                }
            }
        }
        Operation::Delete => {
            rows.retain(|row| !matches_all(row, statement.conditions()));
        }
    }

    Ok(())
}

fn matches_all(row: &Row, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| {
        row.get(condition.column)
            .and_then(|value| compare(value, &condition.value))
            .is_some_and(|ordering| holds(condition.operator, ordering))
    })
}

/// Order two values of the same kind; `NULL` and mixed kinds never compare.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::UInt(a), Value::UInt(b)) => Some(a.cmp(b)),
        (Value::SmallInt(a), Value::SmallInt(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

const fn holds(operator: Operator, ordering: Ordering) -> bool {
    match operator {
        Operator::Eq => matches!(ordering, Ordering::Equal),
        Operator::NotEq => !matches!(ordering, Ordering::Equal),
        Operator::Lt => matches!(ordering, Ordering::Less),
        Operator::LtEq => !matches!(ordering, Ordering::Greater),
        Operator::Gt => matches!(ordering, Ordering::Greater),
        Operator::GtEq => !matches!(ordering, Ordering::Less),
    }
}
