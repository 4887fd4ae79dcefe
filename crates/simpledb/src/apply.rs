//! Migration applier.
//!
//! Turns a [`SchemaDiff`] into DDL and runs it through an [`Executor`]. The
//! order is fixed:
//!
//! 1. create missing tables;
//! 2. create junction tables for the relations of the new tables;
//! 3. add missing columns to tables that already existed;
//! 4. create missing relations;
//! 5. modify changed columns;
//! 6. drop removed tables, relation infrastructure first;
//! 7. drop removed columns;
//! 8. drop removed relations.
//!
//! Execution stops at the first failing statement. Nothing is rolled back.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::diff::SchemaDiff;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::relation;

/// A statement the applier will run, with the schema object it migrates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStatement {
    /// Table, `table.column`, or `from -> to`.
    pub target: String,
    /// The statement.
    pub sql: String,
}

impl PlannedStatement {
    fn new(target: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sql: sql.into(),
        }
    }
}

/// Outcome of a successful migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Number of statements executed.
    pub operations: usize,
    /// Tables created in this run.
    pub created_tables: Vec<String>,
    /// Executed statements, in order.
    pub statements: Vec<String>,
}

/// Applies schema diffs against an executor.
pub struct Applier<'a, E: Executor> {
    executor: &'a E,
}

impl<'a, E: Executor> Applier<'a, E> {
    /// Creates an applier running statements on `executor`.
    #[must_use]
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Renders the statements for `diff` without running them.
    #[must_use]
    pub fn plan(diff: &SchemaDiff) -> Vec<String> {
        plan_statements(diff).into_iter().map(|s| s.sql).collect()
    }

    /// Runs every statement for `diff` in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoChanges`] when there was nothing to run, and
    /// [`Error::Statement`] naming the target of the first failing statement.
    pub async fn apply(&self, diff: &SchemaDiff) -> Result<ApplyReport> {
        let planned = plan_statements(diff);
        if planned.is_empty() {
            debug!("Schema is up to date");
            return Err(Error::NoChanges);
        }

        info!(
            statements = planned.len(),
            new_tables = diff.missing_tables.len(),
            removed_tables = diff.removed_tables.len(),
            "Applying migration"
        );

        let mut report = ApplyReport {
            created_tables: diff.missing_tables.iter().map(|t| t.name.clone()).collect(),
            ..ApplyReport::default()
        };

        for statement in planned {
            debug!(target_object = %statement.target, sql = %statement.sql, "Executing SQL");
            self.executor
                .execute(&statement.sql, &[])
                .await
                .map_err(|err| match err {
                    Error::Database(source) => Error::Statement {
                        target: statement.target.clone(),
                        sql: statement.sql.clone(),
                        source,
                    },
                    other => other,
                })?;
            report.operations += 1;
            report.statements.push(statement.sql);
        }

        info!(operations = report.operations, "Migration applied");
        Ok(report)
    }
}

/// Builds the ordered statement list for a diff.
#[must_use]
pub fn plan_statements(diff: &SchemaDiff) -> Vec<PlannedStatement> {
    let mut planned = Vec::new();

    let created: HashSet<&str> = diff
        .missing_tables
        .iter()
        .map(|t| t.name.as_str())
        .collect();

    for table in &diff.missing_tables {
        planned.push(PlannedStatement::new(&table.name, table.create_sql()));
    }

    for table in &diff.missing_tables {
        for rel in &table.relations {
            planned.push(PlannedStatement::new(
                rel.to_string(),
                relation::create_junction_table_sql(&rel.from, &rel.to),
            ));
        }
    }

    for column in &diff.missing_columns {
        if created.contains(column.table.as_str()) {
            continue;
        }
        planned.push(PlannedStatement::new(
            format!("{}.{}", column.table, column.name),
            format!("ALTER TABLE {} ADD COLUMN {}", column.table, column),
        ));
    }

    for rel in &diff.missing_relations {
        if let Some(sql) = relation::create_relation_sql(rel) {
            planned.push(PlannedStatement::new(rel.to_string(), sql));
        }
    }

    for column in &diff.different_columns {
        planned.push(PlannedStatement::new(
            format!("{}.{}", column.table, column.name),
            format!("ALTER TABLE {} MODIFY COLUMN {}", column.table, column),
        ));
    }

    for table in &diff.removed_tables {
        for rel in &table.relations {
            if let Some(sql) = relation::drop_relation_sql(rel) {
                planned.push(PlannedStatement::new(rel.to_string(), sql));
            }
        }
        planned.push(PlannedStatement::new(
            &table.name,
            format!("DROP TABLE {}", table.name),
        ));
    }

    for column in &diff.removed_columns {
        planned.push(PlannedStatement::new(
            format!("{}.{}", column.table, column.name),
            format!("ALTER TABLE {} DROP COLUMN {}", column.table, column.name),
        ));
    }

    for rel in &diff.removed_relations {
        if let Some(sql) = relation::drop_relation_sql(rel) {
            planned.push(PlannedStatement::new(rel.to_string(), sql));
        }
    }

    planned
}
