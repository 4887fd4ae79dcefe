//! Lightweight ORM with automatic schema migrations.
//!
//! Models are plain structs whose fields carry annotation strings such as
//! `"LENGTH:255,NULLABLE:true"`. Registering models on a [`Database`] and
//! calling [`Database::migrate`] runs one migration cycle:
//!
//! 1. build the current schema from the registered models;
//! 2. load the latest snapshot from the snapshot directory;
//! 3. diff the two;
//! 4. apply the changes (create/alter/drop) through the executor;
//! 5. write a new snapshot when anything changed.
//!
//! # Architecture
//!
//! - **Tags** - annotation parsing ([`tags`])
//! - **Model** - model description and schema extraction ([`model`], [`schema`])
//! - **Diff** - schema comparison ([`diff`])
//! - **Apply** - DDL generation and execution ([`apply`], [`relation`])
//! - **Snapshot** - timestamped JSON schema history ([`snapshot`])
//! - **Query** - SQL text and bind values for reads and writes ([`query`])
//!
//! # Example
//!
//! ```rust,ignore
//! use simpledb::prelude::*;
//! use simpledb_derive::Model;
//!
//! #[derive(Model)]
//! struct User {
//!     #[simpledb("PRIMARY:true,AUTO:true")]
//!     id: i64,
//!     #[simpledb("LENGTH:255")]
//!     name: String,
//! }
//!
//! let pool = DatabaseConfig::from_env()?.connect_mysql().await?;
//! let mut db = Database::new(pool);
//! db.register::<User>()?;
//! db.migrate().await?;
//! ```
//!
//! # Rows
//!
//! Rows decode through `sqlx::FromRow`, so a model that also derives
//! `sqlx::FromRow` can be read back:
//!
//! ```rust,ignore
//! #[derive(Model, sqlx::FromRow)]
//! struct User { /* ... */ }
//!
//! let id = db.insert_model(&user).await?;
//! let user: Option<User> = db.fetch_one(db.query_set::<User>().get(id)?).await?;
//! let named: Vec<User> = db
//!     .filter::<User, User>(&Filters::new().add("name", Operator::Like, "a%"))
//!     .await?;
//! ```

pub mod apply;
pub mod config;
pub mod database;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod model;
pub mod query;
pub mod relation;
pub mod schema;
pub mod snapshot;
pub mod tags;

pub use database::Database;
pub use error::{Error, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::apply::{ApplyReport, Applier, PlannedStatement};
    pub use crate::config::DatabaseConfig;
    pub use crate::database::Database;
    pub use crate::dialect::Dialect;
    pub use crate::diff::SchemaDiff;
    pub use crate::error::{Error, Result};
    pub use crate::executor::{ExecResult, Executor, SqlValue, ToSqlValue};
    pub use crate::model::{FieldDef, FieldKind, Model, ModelDescriptor};
    pub use crate::query::{build_query, Filter, FilterValue, Filters, Operator, QuerySet};
    pub use crate::schema::{Column, DbType, Migration, Relation, RelationKind, Table};
    pub use crate::snapshot::SnapshotStore;
    pub use crate::tags::ModelTags;
}
