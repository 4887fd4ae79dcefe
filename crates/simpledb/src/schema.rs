//! Schema representation types.
//!
//! These types describe the structure of database tables. They are built from
//! the registered models on every migration run and compared against the last
//! persisted snapshot. The serialized field names follow the snapshot file
//! format (`Name`, `Columns`, `Relations`, ...).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::tags::ModelTags;

/// Default directory for snapshot files.
pub const DEFAULT_DIRECTORY: &str = "./migrations/";

/// Logical column types.
///
/// Anything outside the fixed set (explicit `TYPE` overrides, dialect names
/// such as SQLite's `INTEGER`) is kept verbatim in [`DbType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DbType {
    /// `VARCHAR`
    Varchar,
    /// `TEXT`
    Text,
    /// `INT`
    Int,
    /// `BOOLEAN`
    Boolean,
    /// `TINYINT`
    TinyInt,
    /// `SMALLINT`
    SmallInt,
    /// `BIGINT`
    BigInt,
    /// `FLOAT`
    Float,
    /// `DOUBLE`
    Double,
    /// `DATETIME`
    DateTime,
    /// `BLOB`
    Blob,
    /// `FOREIGN KEY`
    ForeignKey,
    /// Any other type name.
    Custom(String),
}

impl DbType {
    /// Returns the SQL spelling of the type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Varchar => "VARCHAR",
            Self::Text => "TEXT",
            Self::Int => "INT",
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::DateTime => "DATETIME",
            Self::Blob => "BLOB",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for DbType {
    fn from(name: &str) -> Self {
        match name {
            "VARCHAR" => Self::Varchar,
            "TEXT" => Self::Text,
            "INT" => Self::Int,
            "BOOLEAN" => Self::Boolean,
            "TINYINT" => Self::TinyInt,
            "SMALLINT" => Self::SmallInt,
            "BIGINT" => Self::BigInt,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            "DATETIME" => Self::DateTime,
            "BLOB" => Self::Blob,
            "FOREIGN KEY" => Self::ForeignKey,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for DbType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<DbType> for String {
    fn from(ty: DbType) -> Self {
        match ty {
            DbType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a relation between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RelationKind {
    /// Many-to-many through a `<from>_<to>` junction table.
    ForeignKey,
    /// Foreign-key constraint on the `from` table.
    OneToOne,
    /// Recognized, but no DDL is generated for it.
    OneToMany,
}

impl RelationKind {
    /// Parses a `RELTYPE` value (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fk" | "foreignkey" | "foreign_key" => Some(Self::ForeignKey),
            "1t1" | "onetoone" | "one_to_one" => Some(Self::OneToOne),
            "otm" | "onetomany" | "one_to_many" => Some(Self::OneToMany),
            _ => None,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForeignKey => "FOREIGN_KEY",
            Self::OneToOne => "ONE_TO_ONE",
            Self::OneToMany => "ONE_TO_MANY",
        }
    }
}

impl TryFrom<String> for RelationKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown relation type '{value}'"))
    }
}

impl From<RelationKind> for String {
    fn from(kind: RelationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of a table.
///
/// Two columns are considered the same when their rendered DDL (the
/// `Display` output) is identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Column {
    /// Name of the table this column belongs to.
    #[serde(default)]
    pub table: String,
    /// Column name.
    pub name: String,
    /// Default value, rendered verbatim. Empty means no default.
    #[serde(default)]
    pub default: String,
    /// Column type.
    #[serde(rename = "Type")]
    pub sql_type: DbType,
    /// Raw SQL replacing every structured modifier. Empty means none.
    #[serde(default)]
    pub raw: String,
    /// Length, rendered as `TYPE(length)` when non-zero.
    #[serde(default)]
    pub length: u32,
    /// Whether the column allows NULL.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the column is UNIQUE.
    #[serde(default)]
    pub unique: bool,
    /// Whether the column is the PRIMARY KEY.
    #[serde(default)]
    pub primary: bool,
    /// Whether the column is indexed.
    #[serde(default)]
    pub index: bool,
    /// Whether the column auto-increments.
    #[serde(default)]
    pub auto: bool,
    /// The annotation the column was built from.
    #[serde(default, deserialize_with = "null_default")]
    pub tags: ModelTags,
}

impl Column {
    /// Creates a NOT NULL column without modifiers.
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>, sql_type: DbType) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            default: String::new(),
            sql_type,
            raw: String::new(),
            length: 0,
            nullable: false,
            unique: false,
            primary: false,
            index: false,
            auto: false,
            tags: ModelTags::new(),
        }
    }

    /// Builds a column from a parsed annotation. A `TYPE` tag overrides
    /// `sql_type`.
    #[must_use]
    pub fn from_tags(
        table: impl Into<String>,
        name: impl Into<String>,
        sql_type: DbType,
        tags: ModelTags,
    ) -> Self {
        let sql_type = match tags.type_override() {
            "" => sql_type,
            explicit => DbType::from(explicit),
        };
        Self {
            table: table.into(),
            name: name.into(),
            default: tags.default_value().to_string(),
            sql_type,
            raw: tags.raw().to_string(),
            length: tags.length(),
            nullable: tags.nullable(),
            unique: tags.unique(),
            primary: tags.primary(),
            index: tags.index(),
            auto: tags.auto(),
            tags,
        }
    }

    /// Sets the length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    /// Allows NULL values.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds a UNIQUE constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column as primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Indexes the column.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Makes the column auto-increment.
    #[must_use]
    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = value.into();
        self
    }

    /// Sets a raw SQL override.
    #[must_use]
    pub fn raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    /// Returns the column DDL fragment used in CREATE and ALTER statements.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.sql_type)?;
        if !self.raw.is_empty() {
            return write!(f, " {}", self.raw);
        }
        if self.length > 0 {
            write!(f, "({})", self.length)?;
        }
        f.write_str(if self.nullable { " NULL" } else { " NOT NULL" })?;
        if self.unique {
            f.write_str(" UNIQUE")?;
        }
        if self.primary {
            f.write_str(" PRIMARY KEY")?;
        }
        if self.index {
            f.write_str(" INDEX")?;
        }
        if self.auto {
            f.write_str(" AUTO_INCREMENT")?;
        }
        if !self.default.is_empty() {
            write!(f, " DEFAULT {}", self.default)?;
        }
        Ok(())
    }
}

/// A directed relation between two tables.
///
/// For change detection only the unordered pair of table names matters; see
/// [`Relation::same_tables`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relation {
    /// Table declaring the relation.
    pub from: String,
    /// Related table.
    pub to: String,
    /// Relation kind.
    #[serde(rename = "Type")]
    pub kind: RelationKind,
}

impl Relation {
    /// Creates a relation.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
        }
    }

    /// The unordered table pair identifying this relation.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        if self.from <= self.to {
            (&self.from, &self.to)
        } else {
            (&self.to, &self.from)
        }
    }

    /// Returns whether both relations connect the same two tables,
    /// regardless of direction and kind.
    #[must_use]
    pub fn same_tables(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    /// Name of the junction table backing a foreign-key relation.
    #[must_use]
    pub fn junction_table(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Complete description of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    #[serde(default, deserialize_with = "null_default")]
    pub columns: Vec<Column>,
    /// Relations declared by this table.
    #[serde(default, deserialize_with = "null_default")]
    pub relations: Vec<Relation>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the `CREATE TABLE` statement for this table.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(Column::to_sql).collect();
        format!("CREATE TABLE {} ({})", self.name, columns.join(", "))
    }
}

/// A schema snapshot: every tracked table as of one migration run.
///
/// `database` and `models` are informational. They are written for humans
/// reading the snapshot and ignored when comparing schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Migration {
    /// Name of the database the snapshot was taken for (opaque).
    #[serde(default)]
    pub database: serde_json::Value,
    /// Tracked tables in registration order.
    #[serde(default, deserialize_with = "null_default")]
    pub tables: Vec<Table>,
    /// Names of the models the tables were built from (opaque).
    #[serde(default)]
    pub models: serde_json::Value,
    /// Directory the snapshot is stored in.
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for Migration {
    fn default() -> Self {
        Self {
            database: serde_json::Value::Null,
            tables: Vec::new(),
            models: serde_json::Value::Null,
            directory: default_directory(),
        }
    }
}

impl Migration {
    /// Creates an empty migration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}

fn default_directory() -> String {
    DEFAULT_DIRECTORY.to_string()
}

/// Deserializes `null` as the type's default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
