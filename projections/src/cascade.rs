//! Cross-table cascade for removed instances.
//!
//! Removing an instance removes every row scoped to it, in every projection.
//! The statement is the same everywhere except for the table and the column
//! holding the instance id, so one reducer is built per projection from those two
//! values.

use crate::events::{DomainEvent, InstanceRemoved};
use iam_projection_core::error::Result;
use iam_projection_core::event::EventHeader;
use iam_projection_core::projection::Reducer;
use iam_projection_core::statement::{Condition, Statement, StatementBatch};

/// Reducer deleting all rows of one table that belong to a removed instance.
///
/// ```
/// use iam_projections::cascade::InstanceRemovedCascade;
///
/// let cascade = InstanceRemovedCascade::new("projections.org_domains", "instance_id");
/// assert_eq!(cascade.column(), "instance_id");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceRemovedCascade {
    table: String,
    column: &'static str,
}

impl InstanceRemovedCascade {
    /// Build the cascade for `table`, scoped by `column`.
    #[must_use]
    pub fn new(table: impl Into<String>, column: &'static str) -> Self {
        Self {
            table: table.into(),
            column,
        }
    }

    /// Target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column compared against the removed instance's aggregate id.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        self.column
    }

    /// The delete statement for the instance that produced `header`.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the statement always carries one condition.
    pub fn statement(&self, header: &EventHeader) -> Result<Statement> {
        Statement::delete(
            self.table.clone(),
            vec![Condition::eq(self.column, header.aggregate_id.as_str())],
        )
    }
}

impl Reducer<DomainEvent> for InstanceRemovedCascade {
    fn reduce(&self, event: &DomainEvent) -> Result<StatementBatch> {
        let DomainEvent::InstanceRemoved(removed) = event else {
            return Err(event.mismatch::<InstanceRemoved>());
        };
        Ok(StatementBatch::single(
            removed.header.clone(),
            self.statement(&removed.header)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iam_projection_core::error::ProjectionError;
    use iam_projection_core::event::{DecodeEvent, RawEvent};
    use iam_projection_core::statement::{Operation, Value};

    #[allow(clippy::unwrap_used)]
    fn event(event_type: &str) -> DomainEvent {
        DomainEvent::decode(
            &RawEvent::builder("instance", event_type)
                .aggregate_id("agg-id")
                .instance_id("instance-id")
                .sequence(15, 10)
                .payload(br#"{"name": "Name"}"#.to_vec())
                .build(),
        )
        .unwrap()
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn one_condition_on_the_configured_column() {
        for (table, column) in [
            ("projections.instances", "id"),
            ("projections.org_domains", "instance_id"),
        ] {
            let batch = InstanceRemovedCascade::new(table, column)
                .reduce(&event("instance.removed"))
                .unwrap();

            assert_eq!(batch.len(), 1);
            assert_eq!(batch.sequence(), 15);
            let stmt = &batch.statements()[0];
            assert_eq!(stmt.table(), table);
            assert_eq!(stmt.operation(), Operation::Delete);
            assert_eq!(stmt.conditions().len(), 1);
            assert_eq!(stmt.conditions()[0].column, column);
            assert_eq!(stmt.conditions()[0].value, Value::Text("agg-id".into()));
        }
    }

    #[test]
    fn other_events_are_rejected() {
        let result = InstanceRemovedCascade::new("projections.instances", "id")
            .reduce(&event("instance.added"));
        assert!(matches!(result, Err(ProjectionError::InvalidArgument { .. })));
    }
}
