//! `PostgreSQL` executer for projection statements.
//!
//! # Overview
//!
//! Statements are rendered to SQL with positional parameters, bound in
//! column-then-condition order, and executed inside one transaction per batch
//! together with the watermark upsert:
//!
//! ```text
//! BEGIN
//!   UPDATE projections.org_domains SET (change_date, sequence, is_primary) = ($1, $2, $3) WHERE ...
//!   UPDATE projections.org_domains SET (change_date, sequence, is_primary) = ($1, $2, $3) WHERE ...
//!   INSERT INTO projections.current_sequences ... ON CONFLICT ... GREATEST(...)
//! COMMIT
//! ```
//!
//! # CQRS Separation
//!
//! The projection tables usually live in their own database. Use
//! [`PostgresExecuter::connect`] with the read-side URL.
//!
//! # Schema
//!
//! Tables are created by the migrations in `projections/migrations`, run by
//! [`PostgresExecuter::migrate`] inside the configured schema. The watermark table:
//!
//! ```sql
//! CREATE TABLE current_sequences (
//!     projection_name TEXT NOT NULL,
//!     aggregate_type TEXT NOT NULL,
//!     instance_id TEXT NOT NULL,
//!     current_sequence BIGINT NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (projection_name, aggregate_type, instance_id)
//! );
//! ```

use crate::catalog::Catalog;
use crate::config::ProjectionConfig;
use iam_projection_core::error::{ProjectionError, Result};
use iam_projection_core::executer::Executer;
use iam_projection_core::statement::{Operation, Statement, StatementBatch, Value};
use iam_projection_core::watermark::WatermarkScope;
use sqlx::Postgres;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Render a statement as `PostgreSQL` SQL with `$n` placeholders.
///
/// ```
/// use iam_projection_core::statement::{Column, Condition, Statement};
/// use iam_projections::postgres::render;
///
/// let stmt = Statement::update(
///     "projections.instances",
///     vec![Column::new("default_language", "en")],
///     vec![Condition::eq("id", "instance-id")],
/// )
/// .unwrap();
///
/// assert_eq!(
///     render(&stmt),
///     "UPDATE projections.instances SET default_language = $1 WHERE (id = $2)"
/// );
/// ```
#[must_use]
pub fn render(statement: &Statement) -> String {
    let mut sql = String::new();
    let columns = statement.column_names().collect::<Vec<_>>().join(", ");
    let placeholders = |from: usize, count: usize| {
        (from..from + count)
            .map(|n| format!("${n}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    match statement.operation() {
        Operation::Insert => {
            let _ = write!(
                sql,
                "INSERT INTO {} ({columns}) VALUES ({})",
                statement.table(),
                placeholders(1, statement.columns().len())
            );
        }
        Operation::Update => {
            let count = statement.columns().len();
            if count == 1 {
                let _ = write!(sql, "UPDATE {} SET {columns} = $1", statement.table());
            } else {
                let _ = write!(
                    sql,
                    "UPDATE {} SET ({columns}) = ({})",
                    statement.table(),
                    placeholders(1, count)
                );
            }
        }
        Operation::Delete => {
            let _ = write!(sql, "DELETE FROM {}", statement.table());
        }
    }

    let offset = statement.columns().len();
    for (i, condition) in statement.conditions().iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        let _ = write!(
            sql,
            "({} {} ${})",
            condition.column,
            condition.operator.as_str(),
            offset + i + 1
        );
    }

    sql
}

/// Convert an unsigned value to `BIGINT`, the column type of sequences.
///
/// # Errors
///
/// Returns [`ProjectionError::Execution`] for values above `i64::MAX`.
pub fn to_bigint(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| ProjectionError::Execution(format!("{value} does not fit in BIGINT")))
}

/// Bind one value.
fn bind_value<'q>(query: PgQuery<'q>, value: &'q Value) -> Result<PgQuery<'q>> {
    Ok(match value {
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bool(v) => query.bind(*v),
        Value::UInt(v) => query.bind(to_bigint(*v)?),
        Value::SmallInt(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
        Value::Null => query.bind(Option::<String>::None),
    })
}

fn migration_error(e: impl std::fmt::Display) -> ProjectionError {
    ProjectionError::Execution(format!("Migration failed: {e}"))
}

fn bind_statement<'q>(statement: &'q Statement, sql: &'q str) -> Result<PgQuery<'q>> {
    statement.values().try_fold(sqlx::query(sql), bind_value)
}

/// PostgreSQL-backed [`Executer`].
///
/// # Example
///
/// ```ignore
/// let config = ProjectionConfig::from_env()?;
/// let catalog = Arc::new(config.catalog());
/// let executer = PostgresExecuter::connect(&config, Arc::clone(&catalog)).await?;
/// executer.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresExecuter {
    pool: PgPool,
    catalog: Arc<Catalog>,
}

impl PostgresExecuter {
    /// Create an executer using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool, catalog: Arc<Catalog>) -> Self {
        Self { pool, catalog }
    }

    /// Connect to the configured read-side database.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Execution`] if the configuration is invalid or
    /// the connection fails.
    pub async fn connect(config: &ProjectionConfig, catalog: Arc<Catalog>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ProjectionError::Execution(e.to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| ProjectionError::Execution(format!("Failed to connect: {e}")))?;

        Ok(Self::new(pool, catalog))
    }

    /// Create the schema and run the projection migrations inside it.
    ///
    /// Migrations in `./migrations` use unqualified table names and run with
    /// `search_path` set to the catalog's schema, so each schema carries its own
    /// tables and its own `_sqlx_migrations` history.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Execution`] if the schema cannot be created or
    /// a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        let schema = self.catalog.schema();

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(migration_error)?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
            .execute(&mut *conn)
            .await
            .map_err(migration_error)?;
        sqlx::query(&format!("SET search_path TO {schema}"))
            .execute(&mut *conn)
            .await
            .map_err(migration_error)?;

        let migrated = sqlx::migrate!("./migrations").run(&mut *conn).await;

        // The connection goes back to the pool
        let reset = sqlx::query("RESET search_path").execute(&mut *conn).await;
        migrated.map_err(migration_error)?;
        reset.map_err(migration_error)?;

        tracing::info!(schema, "Projection tables migrated");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The catalog this executer migrates and writes watermarks for.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl Executer for PostgresExecuter {
    fn current_sequence<'a>(
        &'a self,
        scope: &'a WatermarkScope,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u64>>> + Send + 'a>> {
        Box::pin(async move {
            let query = format!(
                "SELECT current_sequence FROM {}
                 WHERE projection_name = $1 AND aggregate_type = $2 AND instance_id = $3",
                self.catalog.current_sequences()
            );

            let result: Option<(i64,)> = sqlx::query_as(&query)
                .bind(scope.projection.as_str())
                .bind(scope.aggregate_type.as_str())
                .bind(scope.instance_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ProjectionError::Watermark(format!("Failed to load watermark: {e}")))?;

            result
                .map(|(sequence,)| {
                    u64::try_from(sequence).map_err(|_| {
                        ProjectionError::Watermark(format!("Negative watermark {sequence}"))
                    })
                })
                .transpose()
        })
    }

    fn execute<'a>(
        &'a self,
        projection: &'a str,
        batch: &'a StatementBatch,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| ProjectionError::Execution(format!("Failed to begin: {e}")))?;

            for statement in batch.statements() {
                let sql = render(statement);
                bind_statement(statement, &sql)?
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        ProjectionError::Execution(format!(
                            "Failed to execute {} on {}: {e}",
                            statement.operation().as_str(),
                            statement.table()
                        ))
                    })?;
            }

            let header = batch.header();
            let upsert = format!(
                "INSERT INTO {} AS cs (projection_name, aggregate_type, instance_id, current_sequence, updated_at)
                 VALUES ($1, $2, $3, $4, now())
                 ON CONFLICT (projection_name, aggregate_type, instance_id) DO UPDATE
                 SET current_sequence = GREATEST(cs.current_sequence, EXCLUDED.current_sequence),
                     updated_at = now()",
                self.catalog.current_sequences()
            );

            let sequence = to_bigint(batch.sequence())?;

            sqlx::query(&upsert)
                .bind(projection)
                .bind(header.aggregate_type.as_str())
                .bind(header.instance_id.as_str())
                .bind(sequence)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    ProjectionError::Execution(format!("Failed to advance watermark: {e}"))
                })?;

            tx.commit()
                .await
                .map_err(|e| ProjectionError::Execution(format!("Failed to commit: {e}")))?;

            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use iam_projection_core::statement::{Column, Condition};

    #[test]
    fn renders_insert() {
        let stmt = Statement::insert(
            "projections.instances",
            vec![
                Column::new("id", "instance-id"),
                Column::new("creation_date", chrono::DateTime::<chrono::Utc>::UNIX_EPOCH),
                Column::new("change_date", chrono::DateTime::<chrono::Utc>::UNIX_EPOCH),
                Column::new("sequence", 15_u64),
                Column::new("name", "Name"),
            ],
        )
        .unwrap();

        assert_eq!(
            render(&stmt),
            "INSERT INTO projections.instances (id, creation_date, change_date, sequence, name) VALUES ($1, $2, $3, $4, $5)"
        );
    }

    #[test]
    fn renders_multi_column_update() {
        let stmt = Statement::update(
            "projections.org_domains",
            vec![
                Column::new("change_date", chrono::DateTime::<chrono::Utc>::UNIX_EPOCH),
                Column::new("sequence", 15_u64),
                Column::new("is_primary", false),
            ],
            vec![
                Condition::eq("org_id", "agg-id"),
                Condition::eq("is_primary", true),
                Condition::eq("instance_id", "instance-id"),
            ],
        )
        .unwrap();

        assert_eq!(
            render(&stmt),
            "UPDATE projections.org_domains SET (change_date, sequence, is_primary) = ($1, $2, $3) WHERE (org_id = $4) AND (is_primary = $5) AND (instance_id = $6)"
        );
    }

    #[test]
    fn renders_delete() {
        let stmt = Statement::delete(
            "projections.org_domains",
            vec![
                Condition::eq("domain", "domain.new"),
                Condition::eq("org_id", "agg-id"),
                Condition::eq("instance_id", "instance-id"),
            ],
        )
        .unwrap();

        assert_eq!(
            render(&stmt),
            "DELETE FROM projections.org_domains WHERE (domain = $1) AND (org_id = $2) AND (instance_id = $3)"
        );
    }

    #[test]
    fn renders_other_operators() {
        use iam_projection_core::statement::Operator;

        let stmt = Statement::delete(
            "projections.org_domains",
            vec![Condition::new("sequence", Operator::LtEq, 10_u64)],
        )
        .unwrap();

        assert_eq!(
            render(&stmt),
            "DELETE FROM projections.org_domains WHERE (sequence <= $1)"
        );
    }

    #[test]
    fn sequences_above_bigint_range_are_rejected() {
        let max = u64::try_from(i64::MAX).unwrap();
        assert_eq!(to_bigint(15).unwrap(), 15);
        assert_eq!(to_bigint(max).unwrap(), i64::MAX);
        assert!(matches!(
            to_bigint(max + 1),
            Err(ProjectionError::Execution(_))
        ));

        let stmt = Statement::update(
            "projections.instances",
            vec![Column::new("sequence", u64::MAX)],
            vec![Condition::eq("id", "instance-id")],
        )
        .unwrap();
        let sql = render(&stmt);
        assert!(matches!(
            bind_statement(&stmt, &sql),
            Err(ProjectionError::Execution(_))
        ));
    }
}
