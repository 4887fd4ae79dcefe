#![allow(dead_code)]

use std::sync::Mutex;

use simpledb::executor::{ExecResult, Executor, SqlValue};
use simpledb::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;

/// Executor that records statements instead of running them.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<(String, Vec<SqlValue>)>>,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every statement starting with `prefix`.
    pub fn failing_on(prefix: &str) -> Self {
        Self {
            fail_on: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }
}

impl RecordingExecutor {
    /// Records `sql` and returns the number of recorded statements.
    fn record(&self, sql: &str, args: &[SqlValue]) -> Result<usize> {
        if let Some(prefix) = &self.fail_on {
            if sql.starts_with(prefix.as_str()) {
                return Err(Error::Database(sqlx::Error::Protocol(format!(
                    "rejected statement: {sql}"
                ))));
            }
        }
        let mut statements = self.statements.lock().unwrap();
        statements.push((sql.to_string(), args.to_vec()));
        Ok(statements.len())
    }
}

/// Queries are recorded like statements and return no rows.
impl Executor for RecordingExecutor {
    type Row = SqliteRow;

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        let recorded = self.record(sql, args)?;
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: i64::try_from(recorded).unwrap(),
        })
    }

    async fn fetch_all<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin,
    {
        self.record(sql, args)?;
        Ok(Vec::new())
    }

    async fn fetch_optional<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin,
    {
        self.record(sql, args)?;
        Ok(None)
    }
}
