//! Database handle and migration orchestration.

use serde_json::Value;
use sqlx::mysql::MySqlPool;
use sqlx::FromRow;
use tracing::{debug, info};

use crate::apply::{ApplyReport, Applier};
use crate::config::DatabaseConfig;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::{ExecResult, Executor, SqlValue, ToSqlValue};
use crate::model::{Model, ModelDescriptor};
use crate::query::{self, Filters, QuerySet};
use crate::relation;
use crate::schema::Migration;
use crate::snapshot::SnapshotStore;

/// Default row limit of query sets.
pub const DEFAULT_LIMIT: u64 = 1000;

/// A database: an executor plus the registered models and their snapshot
/// history.
///
/// ```ignore
/// let pool = DatabaseConfig::from_env()?.connect_mysql().await?;
/// let mut db = Database::new(pool);
/// db.register::<User>()?;
/// match db.migrate().await {
///     Ok(report) => println!("{} operations", report.operations),
///     Err(e) if e.is_no_changes() => {}
///     Err(e) => return Err(e.into()),
/// }
/// ```
#[derive(Debug)]
pub struct Database<E: Executor> {
    executor: E,
    dialect: Dialect,
    models: Vec<ModelDescriptor>,
    store: SnapshotStore,
    limit: u64,
    name: Option<String>,
    latest_migration: Option<Migration>,
}

impl Database<MySqlPool> {
    /// Connects to MySQL with the given settings.
    ///
    /// # Errors
    ///
    /// Fails like [`DatabaseConfig::connect_mysql`].
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = config.connect_mysql().await?;
        Ok(Self::new(pool).with_name(config.name.clone()))
    }
}

impl<E: Executor> Database<E> {
    /// Creates a database using the MySQL dialect and `./migrations/`.
    #[must_use]
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            dialect: Dialect::default(),
            models: Vec::new(),
            store: SnapshotStore::default(),
            limit: DEFAULT_LIMIT,
            name: None,
            latest_migration: None,
        }
    }

    /// Sets the dialect used to resolve column types.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets the snapshot store.
    #[must_use]
    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = store;
        self
    }

    /// Sets the default query limit.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the database name recorded in snapshots.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the snapshot store.
    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Returns the default query limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns the schema written by the last migration run of this handle
    /// that changed something.
    #[must_use]
    pub fn latest_migration(&self) -> Option<&Migration> {
        self.latest_migration.as_ref()
    }

    /// Registers a model.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelDescriptor::new`]; nothing is registered then.
    pub fn register<M: Model>(&mut self) -> Result<()> {
        let descriptor = ModelDescriptor::of::<M>()?;
        self.register_descriptor(descriptor);
        Ok(())
    }

    /// Registers an already described model.
    pub fn register_descriptor(&mut self, descriptor: ModelDescriptor) {
        debug!(
            table = descriptor.table_name(),
            fields = descriptor.fields().len(),
            "Registered model"
        );
        self.models.push(descriptor);
    }

    /// Returns the registered models in registration order.
    #[must_use]
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Builds the schema of the registered models.
    #[must_use]
    pub fn current_schema(&self) -> Migration {
        let mut migration = Migration::from_models(&self.models, self.dialect);
        migration.directory = self.store.dir().display().to_string();
        if let Some(name) = &self.name {
            migration.database = Value::String(name.clone());
        }
        migration
    }

    /// Brings the database in line with the registered models.
    ///
    /// Diffs the current schema against the latest snapshot, applies the
    /// changes, and writes a new snapshot when at least one statement ran.
    /// The in-memory latest migration is updated as soon as the statements
    /// have run, before the snapshot is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoChanges`] when the schema is up to date,
    /// [`Error::Statement`] for the first failing statement, and I/O or
    /// serialization errors from the snapshot store.
    pub async fn migrate(&mut self) -> Result<ApplyReport> {
        info!(models = self.models.len(), "Initializing migration");

        let current = self.current_schema();
        let persisted = self.store.load()?;
        let diff = current.diff(&persisted);
        debug!(changes = diff.len(), "Compared schema with latest migration");

        let report = Applier::new(&self.executor).apply(&diff).await?;

        let latest = self.latest_migration.insert(current);
        self.store.save(latest)?;
        Ok(report)
    }

    /// Executes a statement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] when the driver rejects the statement.
    pub async fn execute(&self, sql: &str, values: &[SqlValue]) -> Result<ExecResult> {
        debug!(sql = %sql, params = values.len(), "Executing SQL");
        self.executor.execute(sql, values).await
    }

    /// Runs a query and decodes every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] when the query fails or a row does not
    /// decode into `T`.
    pub async fn fetch_all<T>(&self, sql: &str, values: &[SqlValue]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        debug!(sql = %sql, params = values.len(), "Querying rows");
        self.executor.fetch_all(sql, values).await
    }

    /// Runs a query and decodes the first row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] when the query fails or the row does not
    /// decode into `T`.
    pub async fn fetch_optional<T>(&self, sql: &str, values: &[SqlValue]) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        debug!(sql = %sql, params = values.len(), "Querying row");
        self.executor.fetch_optional(sql, values).await
    }

    /// Runs a query set and decodes every row.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_all`].
    pub async fn fetch<T>(&self, query: &QuerySet) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        let (sql, values) = query.build();
        self.fetch_all(&sql, &values).await
    }

    /// Runs a query set limited to one row.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_optional`].
    pub async fn fetch_one<T>(&self, query: QuerySet) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        let (sql, values) = query.page_size(0).limit(1).build();
        self.fetch_optional(&sql, &values).await
    }

    /// Returns the rows of `M`, highest id first, up to the database limit.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_all`].
    pub async fn all<M, T>(&self) -> Result<Vec<T>>
    where
        M: Model,
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        self.filter::<M, T>(&Filters::new()).await
    }

    /// Returns the rows of `M` matching every filter, highest id first, up to
    /// the database limit.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_all`].
    pub async fn filter<M, T>(&self, filters: &Filters) -> Result<Vec<T>>
    where
        M: Model,
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        let statement = format!("SELECT * FROM {}", M::table_name());
        let (mut sql, values) = query::build_query(&[statement], filters, 0, 0);
        sql.push_str(&format!(" ORDER BY id DESC LIMIT {}", self.limit));
        self.fetch_all(&sql, &values).await
    }

    /// Counts the rows of `table` matching every filter.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_optional`].
    pub async fn count(&self, table: &str, filters: &Filters) -> Result<i64>
    where
        (i64,): for<'r> FromRow<'r, E::Row>,
    {
        let (sql, values) = query::count_query(table, filters);
        let row: Option<(i64,)> = self.executor.fetch_optional(&sql, &values).await?;
        Ok(row.map_or(0, |(count,)| count))
    }

    /// Inserts `model` and returns the id of the new row.
    ///
    /// An `id` column that is NULL or zero is left out so the database
    /// assigns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] when the insert fails.
    pub async fn insert_model<M: Model>(&self, model: &M) -> Result<i64> {
        let values: Vec<(String, SqlValue)> = model
            .column_values()
            .into_iter()
            .filter(|(column, value)| {
                column != "id" || !matches!(value, SqlValue::Null | SqlValue::Int(0))
            })
            .collect();
        let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
        let args: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();

        let sql = query::insert_query(M::table_name(), &columns);
        let result = self.execute(&sql, &args).await?;
        info!(table = M::table_name(), id = result.last_insert_id, "Inserted model");
        Ok(result.last_insert_id)
    }

    /// Updates every column of the row with the id of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] when `M` has no `id` column and
    /// [`Error::Database`] when the update fails.
    pub async fn update_model<M: Model>(&self, model: &M) -> Result<ExecResult> {
        let (id, values) = split_id::<M>(model.column_values())?;
        let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
        let mut args: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
        args.push(id);

        let sql = query::update_query(M::table_name(), &columns, "id = ?");
        self.execute(&sql, &args).await
    }

    /// Deletes the row with the id of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] when `M` has no `id` column and
    /// [`Error::Database`] when the delete fails.
    pub async fn delete_model<M: Model>(&self, model: &M) -> Result<ExecResult> {
        let (id, _) = split_id::<M>(model.column_values())?;
        let sql = query::delete_query(M::table_name(), "id = ?");
        self.execute(&sql, &[id]).await
    }

    /// Returns a query set for `M` with the database limit.
    #[must_use]
    pub fn query_set<M: Model>(&self) -> QuerySet {
        QuerySet::for_model::<M>(self.limit)
    }

    /// Links two rows through the `<from>_<to>` junction table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] when the insert fails.
    pub async fn insert_relation(
        &self,
        from: &str,
        to: &str,
        from_id: impl ToSqlValue,
        to_id: impl ToSqlValue,
    ) -> Result<ExecResult> {
        let sql = relation::insert_relation_sql(from, to);
        self.execute(&sql, &[from_id.to_sql_value(), to_id.to_sql_value()])
            .await
    }

    /// Unlinks two rows of the `<from>_<to>` junction table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] when the delete fails.
    pub async fn delete_relation(
        &self,
        from: &str,
        to: &str,
        from_id: impl ToSqlValue,
        to_id: impl ToSqlValue,
    ) -> Result<ExecResult> {
        let sql = relation::delete_relation_sql(from, to);
        self.execute(&sql, &[from_id.to_sql_value(), to_id.to_sql_value()])
            .await
    }

    /// Returns the `to` rows linked to `from_id` through the junction table.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_all`].
    pub async fn select_related<T>(
        &self,
        from: &str,
        to: &str,
        from_id: impl ToSqlValue,
    ) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        let sql = relation::select_related_sql(from, to);
        self.fetch_all(&sql, &[from_id.to_sql_value()]).await
    }

    /// Returns the `from` rows linked to `to_id` through the junction table.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_all`].
    pub async fn select_related_reverse<T>(
        &self,
        from: &str,
        to: &str,
        to_id: impl ToSqlValue,
    ) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        let sql = relation::select_related_reverse_sql(from, to);
        self.fetch_all(&sql, &[to_id.to_sql_value()]).await
    }

    /// Returns the `from` rows that hold a one-to-one link to `to`.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::fetch_all`].
    pub async fn select_one_to_one<T>(&self, from: &str, to: &str) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, E::Row> + Send + Unpin,
    {
        let sql = relation::select_one_to_one_sql(from, to);
        self.fetch_all(&sql, &[]).await
    }
}

/// Splits the `id` column off a model's column values.
fn split_id<M: Model>(
    values: Vec<(String, SqlValue)>,
) -> Result<(SqlValue, Vec<(String, SqlValue)>)> {
    let (ids, rest): (Vec<_>, Vec<_>) =
        values.into_iter().partition(|(column, _)| column == "id");
    let (_, id) = ids.into_iter().next().ok_or_else(|| {
        Error::Query(format!("model {} has no id column", M::table_name()))
    })?;
    Ok((id, rest))
}
