//! Query building.
//!
//! [`QuerySet`] assembles a statement from fragments, a list of
//! [`Filters`] rendered as the `WHERE` clause, and a `LIMIT`/`OFFSET`. The
//! result is SQL text with `?` placeholders plus the values to bind, ready
//! for `sqlx::query_as` or [`Executor::execute`](crate::executor::Executor).
//!
//! # Example
//!
//! ```ignore
//! let (sql, values) = QuerySet::for_table("user", 1000)
//!     .all()
//!     .where_("age", Operator::Gt, 18)
//!     .build();
//! // SELECT * FROM user WHERE age > ? LIMIT 1000 OFFSET 0
//! ```
//!
//! The filters always go after the collected statements, so `ORDER BY` and
//! `GROUP BY` fragments should be added with [`QuerySet::raw`] when a
//! `WHERE` clause is needed before them.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::executor::{SqlValue, ToSqlValue};
use crate::model::Model;

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `LIKE`
    Like,
    /// `IN`
    In,
}

impl Operator {
    /// Returns the SQL spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "=" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "LIKE" => Ok(Self::Like),
            "IN" => Ok(Self::In),
            other => Err(Error::Query(format!("unknown operator '{other}'"))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value compared by a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// One value, bound to a single `?`.
    Single(SqlValue),
    /// A list for `IN`, one `?` per item.
    List(Vec<SqlValue>),
}

/// One `column <op> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Operator.
    pub operator: Operator,
    /// Compared value.
    pub value: FilterValue,
}

impl Filter {
    fn render(&self, sql: &mut String, values: &mut Vec<SqlValue>) {
        match &self.value {
            // `IN ()` is not valid SQL; an empty list matches nothing.
            FilterValue::List(items) if items.is_empty() => sql.push_str("1 = 0"),
            FilterValue::List(items) => {
                let placeholders = vec!["?"; items.len()].join(", ");
                sql.push_str(&format!("{} {} ({placeholders})", self.column, self.operator));
                values.extend(items.iter().cloned());
            }
            FilterValue::Single(value) => {
                sql.push_str(&format!("{} {} ?", self.column, self.operator));
                values.push(value.clone());
            }
        }
    }
}

/// Ordered list of filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(Vec<Filter>);

impl Filters {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single-value filter.
    #[must_use]
    pub fn add(mut self, column: impl Into<String>, operator: Operator, value: impl ToSqlValue) -> Self {
        self.0.push(Filter {
            column: column.into(),
            operator,
            value: FilterValue::Single(value.to_sql_value()),
        });
        self
    }

    /// Adds an `IN` filter.
    #[must_use]
    pub fn add_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToSqlValue,
    {
        self.0.push(Filter {
            column: column.into(),
            operator: Operator::In,
            value: FilterValue::List(values.into_iter().map(ToSqlValue::to_sql_value).collect()),
        });
        self
    }

    /// Returns the value of the first filter on `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&FilterValue> {
        self.0.iter().find(|f| f.column == column).map(|f| &f.value)
    }

    /// Returns whether a filter on `column` exists.
    #[must_use]
    pub fn has(&self, column: &str) -> bool {
        self.0.iter().any(|f| f.column == column)
    }

    /// Removes the first filter on `column`.
    #[must_use]
    pub fn remove(mut self, column: &str) -> Self {
        if let Some(pos) = self.0.iter().position(|f| f.column == column) {
            self.0.remove(pos);
        }
        self
    }

    /// Returns the number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends all filters of `other`.
    pub fn extend(&mut self, other: Filters) {
        self.0.extend(other.0);
    }

    /// Renders ` WHERE ...`, joining conditions with `AND` (or `OR` when
    /// `and` is false). An empty list renders as `""`.
    #[must_use]
    pub fn to_sql(&self, and: bool) -> (String, Vec<SqlValue>) {
        if self.0.is_empty() {
            return (String::new(), Vec::new());
        }
        let joiner = if and { " AND " } else { " OR " };
        let mut sql = String::from(" WHERE ");
        let mut values = Vec::new();
        for (i, filter) in self.0.iter().enumerate() {
            if i > 0 {
                sql.push_str(joiner);
            }
            filter.render(&mut sql, &mut values);
        }
        (sql, values)
    }
}

/// Joins statements with spaces, appends the AND-joined filters and, when
/// `limit > 0`, ` LIMIT <limit> OFFSET <offset>`.
#[must_use]
pub fn build_query<S: AsRef<str>>(
    statements: &[S],
    filters: &Filters,
    limit: u64,
    offset: u64,
) -> (String, Vec<SqlValue>) {
    let (where_sql, values) = filters.to_sql(true);
    let mut sql = statements
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");
    sql.push_str(&where_sql);
    if limit > 0 {
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    }
    (sql, values)
}

/// Fluent query description.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySet {
    table: Option<String>,
    statements: Vec<String>,
    filters: Filters,
    limit: u64,
    offset: u64,
    page_size: u64,
}

impl QuerySet {
    /// Creates a query set not bound to a table.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            table: None,
            statements: Vec::new(),
            filters: Filters::new(),
            limit,
            offset: 0,
            page_size: 0,
        }
    }

    /// Creates a query set bound to `table`.
    #[must_use]
    pub fn for_table(table: impl Into<String>, limit: u64) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::new(limit)
        }
    }

    /// Creates a query set bound to the table of `M`.
    #[must_use]
    pub fn for_model<M: Model>(limit: u64) -> Self {
        Self::for_table(M::table_name(), limit)
    }

    /// Returns the bound table.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Returns the collected statements.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Returns the filters.
    #[must_use]
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Appends a statement fragment.
    #[must_use]
    pub fn add(mut self, statement: impl Into<String>) -> Self {
        self.statements.push(statement.into());
        self
    }

    /// Appends filters.
    #[must_use]
    pub fn add_filters(mut self, filters: Filters) -> Self {
        self.filters.extend(filters);
        self
    }

    /// `SELECT *`, followed by `FROM <table>` when bound to a table.
    #[must_use]
    pub fn all(self) -> Self {
        let qs = self.add("SELECT *");
        match qs.table.clone() {
            Some(table) => qs.from_table(table),
            None => qs,
        }
    }

    /// `SELECT COUNT(*)`.
    #[must_use]
    pub fn count(self) -> Self {
        self.add("SELECT COUNT(*)")
    }

    /// `SELECT <columns>`.
    #[must_use]
    pub fn select(self, columns: &[&str]) -> Self {
        let columns = columns.join(", ");
        self.add(format!("SELECT {columns}"))
    }

    /// `FROM <bound table>`. Fails when the query set is not bound to a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] when no table is bound.
    pub fn from(self) -> Result<Self> {
        let table = self
            .table
            .clone()
            .ok_or_else(|| Error::Query("no model provided, cannot infer table name".into()))?;
        Ok(self.from_table(table))
    }

    /// `FROM <table>`.
    #[must_use]
    pub fn from_table(self, table: impl AsRef<str>) -> Self {
        let table = table.as_ref().to_string();
        self.add(format!("FROM {table}"))
    }

    /// Adds a filter.
    #[must_use]
    pub fn where_(mut self, column: impl Into<String>, operator: Operator, value: impl ToSqlValue) -> Self {
        self.filters = self.filters.add(column, operator, value);
        self
    }

    /// Adds an `IN` filter.
    #[must_use]
    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToSqlValue,
    {
        self.filters = self.filters.add_in(column, values);
        self
    }

    /// `GROUP BY <columns>`.
    #[must_use]
    pub fn group_by(self, columns: &[&str]) -> Self {
        let columns = columns.join(", ");
        self.add(format!("GROUP BY {columns}"))
    }

    /// `ORDER BY <column> <order>`.
    #[must_use]
    pub fn order_by(self, column: &str, order: &str) -> Self {
        self.add(format!("ORDER BY {column} {order}"))
    }

    /// `JOIN <table> ON <column> <op> <other>`.
    #[must_use]
    pub fn join(self, table: &str, column: &str, operator: Operator, other: &str) -> Self {
        self.add(format!("JOIN {table} ON {column} {operator} {other}"))
    }

    /// Sets the limit. `0` disables it.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the page size. A page size takes precedence over the limit.
    #[must_use]
    pub fn page_size(mut self, size: u64) -> Self {
        self.page_size = size;
        self
    }

    /// Selects page `page` (1-based) of the bound table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] when no statement was added and no table is
    /// bound.
    pub fn page(self, page: u64) -> Result<Self> {
        let qs = self.setup()?;
        let offset = page.saturating_sub(1) * qs.page_size;
        Ok(qs.offset(offset))
    }

    /// Selects the row with the given id from the bound table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] when no statement was added and no table is
    /// bound.
    pub fn get(self, id: i64) -> Result<Self> {
        Ok(self.setup()?.where_("id", Operator::Eq, id).limit(1))
    }

    /// Appends raw SQL and builds the query.
    #[must_use]
    pub fn raw(self, sql: &str) -> (String, Vec<SqlValue>) {
        self.add(sql).build()
    }

    /// Removes statements and filters.
    #[must_use]
    pub fn clear(mut self) -> Self {
        self.statements.clear();
        self.filters = Filters::new();
        self
    }

    /// Returns the SQL text and the values to bind.
    #[must_use]
    pub fn build(&self) -> (String, Vec<SqlValue>) {
        let limit = if self.page_size > 0 {
            self.page_size
        } else {
            self.limit
        };
        build_query(&self.statements, &self.filters, limit, self.offset)
    }

    /// Starts a `SELECT * FROM <table>` unless a statement and its `FROM`
    /// were already added.
    fn setup(self) -> Result<Self> {
        if self.statements.len() >= 2 {
            return Ok(self);
        }
        if self.table.is_none() {
            return Err(Error::Query(
                "no model provided, cannot infer table name".into(),
            ));
        }
        Ok(self.clear().all())
    }
}

/// `INSERT INTO <table> (<columns>) VALUES (?, ...)`.
#[must_use]
pub fn insert_query(table: &str, columns: &[&str]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO {table} ({}) VALUES ({placeholders})", columns.join(", "))
}

/// `UPDATE <table> SET <column> = ?, ... WHERE <condition>`.
#[must_use]
pub fn update_query(table: &str, columns: &[&str], condition: &str) -> String {
    let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
    format!("UPDATE {table} SET {} WHERE {condition}", assignments.join(", "))
}

/// `DELETE FROM <table> WHERE <condition>`.
#[must_use]
pub fn delete_query(table: &str, condition: &str) -> String {
    format!("DELETE FROM {table} WHERE {condition}")
}

/// `SELECT <columns> FROM <table>`, with ` WHERE <condition>` when the
/// condition is not empty.
#[must_use]
pub fn select_query(table: &str, columns: &[&str], condition: &str) -> String {
    let mut sql = format!("SELECT {} FROM {table}", columns.join(", "));
    if !condition.is_empty() {
        sql.push_str(&format!(" WHERE {condition}"));
    }
    sql
}

/// `SELECT COUNT(*) FROM <table>` with the filters AND-joined.
#[must_use]
pub fn count_query(table: &str, filters: &Filters) -> (String, Vec<SqlValue>) {
    build_query(&[format!("SELECT COUNT(*) FROM {table}")], filters, 0, 0)
}
