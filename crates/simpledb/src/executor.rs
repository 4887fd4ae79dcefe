//! Statement execution.
//!
//! The migration engine only needs to run a statement with positional `?`
//! arguments; the model and relation helpers also read rows back.
//! [`Executor`] is that capability. It is implemented for the sqlx SQLite and
//! MySQL pools and can be implemented by tests to record statements.

use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlRow};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Arguments, FromRow};

use crate::error::Result;

/// A SQL value bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! int_to_sql_value {
    ($($ty:ty),*) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )*
    };
}

int_to_sql_value!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for chrono::NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

/// Outcome of an executed statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows changed.
    pub rows_affected: u64,
    /// Id of the last inserted row, when the driver reports one.
    pub last_insert_id: i64,
}

/// Something that can run statements and read rows back.
///
/// Rows are decoded with `sqlx::FromRow` for the backend's row type, so a
/// `#[derive(sqlx::FromRow)]` struct or a tuple works for either pool.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Row type of the backend.
    type Row: sqlx::Row;

    /// Executes `sql`, binding `args` to its `?` placeholders in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) when the driver
    /// rejects the statement.
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<ExecResult>;

    /// Runs a query and decodes every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) when the query
    /// fails or a row does not decode.
    async fn fetch_all<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin;

    /// Runs a query and decodes the first row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) when the query
    /// fails or the row does not decode.
    async fn fetch_optional<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin;
}

impl Executor for SqlitePool {
    type Row = SqliteRow;

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        let result = sqlx::query_with::<Sqlite, _>(sql, sqlite_arguments(args)?)
            .execute(self)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    async fn fetch_all<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin,
    {
        let rows = sqlx::query_as_with::<Sqlite, T, _>(sql, sqlite_arguments(args)?)
            .fetch_all(self)
            .await?;
        Ok(rows)
    }

    async fn fetch_optional<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin,
    {
        let row = sqlx::query_as_with::<Sqlite, T, _>(sql, sqlite_arguments(args)?)
            .fetch_optional(self)
            .await?;
        Ok(row)
    }
}

impl Executor for MySqlPool {
    type Row = MySqlRow;

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        let result = sqlx::query_with::<MySql, _>(sql, mysql_arguments(args)?)
            .execute(self)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: i64::try_from(result.last_insert_id()).unwrap_or(i64::MAX),
        })
    }

    async fn fetch_all<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin,
    {
        let rows = sqlx::query_as_with::<MySql, T, _>(sql, mysql_arguments(args)?)
            .fetch_all(self)
            .await?;
        Ok(rows)
    }

    async fn fetch_optional<T>(&self, sql: &str, args: &[SqlValue]) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin,
    {
        let row = sqlx::query_as_with::<MySql, T, _>(sql, mysql_arguments(args)?)
            .fetch_optional(self)
            .await?;
        Ok(row)
    }
}

/// Binds SqlValue parameters for a SQLite query.
fn sqlite_arguments<'q>(args: &[SqlValue]) -> Result<SqliteArguments<'q>> {
    let mut arguments = SqliteArguments::default();
    for value in args {
        match value.clone() {
            SqlValue::Null => arguments.add(Option::<i64>::None),
            SqlValue::Bool(b) => arguments.add(b),
            SqlValue::Int(i) => arguments.add(i),
            SqlValue::Float(f) => arguments.add(f),
            SqlValue::Text(s) => arguments.add(s),
            SqlValue::Blob(b) => arguments.add(b),
        }
        .map_err(sqlx::Error::Encode)?;
    }
    Ok(arguments)
}

/// Binds SqlValue parameters for a MySQL query.
fn mysql_arguments(args: &[SqlValue]) -> Result<MySqlArguments> {
    let mut arguments = MySqlArguments::default();
    for value in args {
        match value.clone() {
            SqlValue::Null => arguments.add(Option::<i64>::None),
            SqlValue::Bool(b) => arguments.add(b),
            SqlValue::Int(i) => arguments.add(i),
            SqlValue::Float(f) => arguments.add(f),
            SqlValue::Text(s) => arguments.add(s),
            SqlValue::Blob(b) => arguments.add(b),
        }
        .map_err(sqlx::Error::Encode)?;
    }
    Ok(arguments)
}
