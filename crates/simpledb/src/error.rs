//! Error types for simpledb.

/// Errors that can occur while describing models, migrating or querying.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A field annotation could not be split into `key:value` pairs.
    #[error("Invalid tag on field '{field}': '{tag}'")]
    InvalidTag {
        /// The field carrying the annotation.
        field: String,
        /// The offending token.
        tag: String,
    },

    /// A relation field has a missing or unknown `RELTYPE`.
    #[error("Invalid relation type on field '{field}': '{value}'")]
    InvalidRelation {
        /// The relation field.
        field: String,
        /// The `RELTYPE` value that was found.
        value: String,
    },

    /// A file in the snapshot directory carries the snapshot prefix but no
    /// parseable timestamp.
    #[error("Failed to parse migration file name: {0}")]
    SnapshotName(String),

    /// A statement failed while applying a migration. Statements executed
    /// before it are not rolled back.
    #[error("Failed to migrate {target}: {source}")]
    Statement {
        /// Table, column (`table.column`) or relation (`from -> to`) being migrated.
        target: String,
        /// The statement that failed.
        sql: String,
        /// The driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The current schema matches the latest snapshot.
    #[error("no migrations to run")]
    NoChanges,

    /// Missing or invalid connection settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query could not be assembled.
    #[error("Query error: {0}")]
    Query(String),

    /// Database error outside of a migration run.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing snapshot files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for the "nothing to migrate" sentinel.
    #[must_use]
    pub fn is_no_changes(&self) -> bool {
        matches!(self, Self::NoChanges)
    }
}

/// Result type for simpledb operations.
pub type Result<T> = std::result::Result<T, Error>;
