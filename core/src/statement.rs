//! Statement model: abstract insert/update/delete mutations against a projection table.
//!
//! A [`Statement`] is produced by a reducer and consumed exactly once by an executer.
//! Column and condition order is part of the storage contract: it fixes the order
//! of bound parameters, so it is preserved exactly as the reducer built it.
//!
//! ```
//! use iam_projection_core::statement::{Column, Condition, Operation, Statement};
//!
//! let stmt = Statement::update(
//!     "projections.instances",
//!     vec![Column::new("default_language", "en")],
//!     vec![Condition::eq("id", "instance-id")],
//! )
//! .unwrap();
//!
//! assert_eq!(stmt.operation(), Operation::Update);
//! assert_eq!(stmt.column_names().collect::<Vec<_>>(), ["default_language"]);
//! ```

use crate::error::{ProjectionError, Result};
use crate::event::EventHeader;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// A value assigned to a column or compared in a condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Text
    Text(String),
    /// Boolean flag
    Bool(bool),
    /// Unsigned integer (event sequences)
    UInt(u64),
    /// Small integer (enum codes)
    SmallInt(i16),
    /// Point in time
    Timestamp(DateTime<Utc>),
    /// SQL `NULL`
    Null,
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Self::SmallInt(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Null => write!(f, "NULL"),
        }
    }
}

/// Kind of mutation a statement performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Insert a new row
    Insert,
    /// Update matching rows
    Update,
    /// Delete matching rows
    Delete,
}

impl Operation {
    /// SQL keyword for this operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Comparison operator of a condition.
///
/// Reducers only need equality; the others are available to executers and
/// future reducers without changing the statement contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl Operator {
    /// SQL spelling of this operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

/// A column assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Column name
    pub name: &'static str,
    /// Assigned value
    pub value: Value,
}

impl Column {
    /// Assign `value` to column `name`.
    #[must_use]
    pub fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// A `column <operator> value` predicate; conditions of a statement are AND-ed.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    /// Column name
    pub column: &'static str,
    /// Comparison operator
    pub operator: Operator,
    /// Compared value
    pub value: Value,
}

impl Condition {
    /// Build a condition with an explicit operator.
    #[must_use]
    pub fn new(column: &'static str, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column,
            operator,
            value: value.into(),
        }
    }

    /// Build an equality condition.
    #[must_use]
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Eq, value)
    }
}

/// An immutable insert/update/delete mutation against one table.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    table: String,
    operation: Operation,
    columns: Vec<Column>,
    conditions: Vec<Condition>,
}

impl Statement {
    /// Build an insert of one row.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidStatement`] if `columns` is empty.
    pub fn insert(table: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let table = table.into();
        if columns.is_empty() {
            return Err(ProjectionError::InvalidStatement {
                table,
                reason: "insert without columns",
            });
        }
        Ok(Self {
            table,
            operation: Operation::Insert,
            columns,
            conditions: Vec::new(),
        })
    }

    /// Build an update of all rows matching `conditions`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidStatement`] if `columns` or `conditions` is empty.
    pub fn update(
        table: impl Into<String>,
        columns: Vec<Column>,
        conditions: Vec<Condition>,
    ) -> Result<Self> {
        let table = table.into();
        if columns.is_empty() {
            return Err(ProjectionError::InvalidStatement {
                table,
                reason: "update without columns",
            });
        }
        if conditions.is_empty() {
            return Err(ProjectionError::InvalidStatement {
                table,
                reason: "update without conditions",
            });
        }
        Ok(Self {
            table,
            operation: Operation::Update,
            columns,
            conditions,
        })
    }

    /// Build a delete of all rows matching `conditions`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidStatement`] if `conditions` is empty;
    /// an unconditioned delete would wipe the table.
    pub fn delete(table: impl Into<String>, conditions: Vec<Condition>) -> Result<Self> {
        let table = table.into();
        if conditions.is_empty() {
            return Err(ProjectionError::InvalidStatement {
                table,
                reason: "delete without conditions",
            });
        }
        Ok(Self {
            table,
            operation: Operation::Delete,
            columns: Vec::new(),
            conditions,
        })
    }

    /// Target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Kind of mutation.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Ordered column assignments (empty for deletes).
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Ordered conditions (empty for inserts).
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Column names in assignment order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// Values in bind order: column values first, then condition values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns
            .iter()
            .map(|c| &c.value)
            .chain(self.conditions.iter().map(|c| &c.value))
    }

    /// Value assigned to `column`, if any.
    #[must_use]
    pub fn value_of(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| &c.value)
    }
}

/// Ordered statements produced for one event; one or two in practice.
pub type Statements = SmallVec<[Statement; 2]>;

/// Everything an executer needs to apply one event: where it came from and
/// the ordered statements to commit together.
///
/// An empty batch is a no-op that only advances the sequence watermark.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementBatch {
    header: EventHeader,
    statements: Statements,
}

impl StatementBatch {
    /// Build a batch from a header and ordered statements.
    #[must_use]
    pub const fn new(header: EventHeader, statements: Statements) -> Self {
        Self { header, statements }
    }

    /// A batch with a single statement.
    #[must_use]
    pub fn single(header: EventHeader, statement: Statement) -> Self {
        let mut statements = Statements::new();
        statements.push(statement);
        Self::new(header, statements)
    }

    /// A batch that mutates nothing but still marks the event as applied.
    #[must_use]
    pub fn noop(header: EventHeader) -> Self {
        Self::new(header, Statements::new())
    }

    /// Event the batch was built from.
    #[must_use]
    pub const fn header(&self) -> &EventHeader {
        &self.header
    }

    /// Sequence of the source event.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.header.sequence
    }

    /// Ordered statements.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether this is a no-op batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_requires_columns() {
        let result = Statement::insert("t", vec![]);
        assert!(matches!(
            result,
            Err(ProjectionError::InvalidStatement { reason: "insert without columns", .. })
        ));
    }

    #[test]
    fn update_requires_columns_and_conditions() {
        assert!(Statement::update("t", vec![], vec![Condition::eq("id", "1")]).is_err());
        assert!(Statement::update("t", vec![Column::new("name", "n")], vec![]).is_err());
    }

    #[test]
    fn delete_requires_conditions() {
        assert!(Statement::delete("t", vec![]).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn values_are_columns_then_conditions() {
        let stmt = Statement::update(
            "t",
            vec![Column::new("sequence", 15_u64), Column::new("is_primary", true)],
            vec![Condition::eq("org_id", "agg-id"), Condition::eq("instance_id", "instance-id")],
        )
        .unwrap();

        let values: Vec<_> = stmt.values().cloned().collect();
        assert_eq!(
            values,
            vec![
                Value::UInt(15),
                Value::Bool(true),
                Value::Text("agg-id".into()),
                Value::Text("instance-id".into()),
            ]
        );
        assert_eq!(stmt.value_of("is_primary"), Some(&Value::Bool(true)));
        assert_eq!(stmt.value_of("name"), None);
    }

    #[test]
    fn optional_values_map_to_null() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("en")), Value::Text("en".into()));
    }

    #[test]
    fn operator_spelling() {
        assert_eq!(Operator::Eq.as_str(), "=");
        assert_eq!(Operator::NotEq.as_str(), "<>");
        assert_eq!(Operator::GtEq.as_str(), ">=");
    }
}
