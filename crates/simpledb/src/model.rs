//! Model description and schema extraction.
//!
//! A [`Model`] exposes its table name and field list. Registration turns it
//! into a [`ModelDescriptor`], parsing every field annotation once, and the
//! descriptor is what the migration engine turns into a [`Table`].
//!
//! # Example
//!
//! ```ignore
//! use simpledb::model::Model;
//!
//! #[derive(Model)]
//! #[simpledb(table = "user")]
//! struct User {
//!     #[simpledb("PRIMARY:true,AUTO:true")]
//!     id: i64,
//!     #[simpledb("LENGTH:255")]
//!     name: String,
//!     #[simpledb("RELTYPE:FK")]
//!     rel_group: Option<i64>,
//! }
//! ```

use serde_json::Value;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::SqlValue;
use crate::schema::{Column, Migration, Relation, RelationKind, Table};
use crate::tags::{self, ModelTags};

/// Primitive kind of a model field, used to pick a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Text.
    String,
    /// Platform-sized integer.
    Int,
    /// 8-bit integer.
    Int8,
    /// 16-bit integer.
    Int16,
    /// 32-bit integer.
    Int32,
    /// 64-bit integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Bool,
    /// Date and time.
    Time,
    /// Binary data.
    Bytes,
    /// Anything else.
    Other,
}

/// A field as declared on a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Primitive kind.
    pub kind: FieldKind,
    /// Annotation string, if any.
    pub tag: Option<String>,
}

impl FieldDef {
    /// Creates a field without annotation.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tag: None,
        }
    }

    /// Sets the annotation.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// A record type mapped to a table.
///
/// Usually implemented with `#[derive(Model)]` from `simpledb-derive`.
pub trait Model {
    /// Returns the table name.
    fn table_name() -> &'static str;

    /// Returns the fields in declaration order.
    fn fields() -> Vec<FieldDef>;

    /// Returns the value of every column of this record, keyed by column
    /// name, in declaration order. Relation fields are not columns.
    fn column_values(&self) -> Vec<(String, SqlValue)>;
}

/// A field whose annotation has been parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedField {
    /// Field name as declared.
    pub name: String,
    /// Primitive kind.
    pub kind: FieldKind,
    /// Parsed annotation.
    pub tags: ModelTags,
    /// Relation kind, for `rel_` fields.
    pub relation: Option<RelationKind>,
}

impl DescribedField {
    /// Column name: the lower-cased field name.
    #[must_use]
    pub fn column_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// For relation fields, the related table: the field name without the
    /// `rel_` prefix.
    #[must_use]
    pub fn related_table(&self) -> Option<&str> {
        self.relation?;
        self.name.get(tags::RELATION_PREFIX.len()..)
    }
}

/// A registered model: its table name and the fields that take part in the
/// schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    table: String,
    fields: Vec<DescribedField>,
}

impl ModelDescriptor {
    /// Describes a model from its table name and declared fields.
    ///
    /// Fields without annotation (or annotated `"-"`) are dropped. Every
    /// other annotation is parsed here, so a malformed tag or an unknown
    /// `RELTYPE` fails at registration rather than mid-migration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] for a malformed annotation and
    /// [`Error::InvalidRelation`] for a `rel_` field without a known `RELTYPE`.
    pub fn new(table: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let table = table.into();
        let mut described = Vec::with_capacity(fields.len());
        for field in fields {
            if !tags::tag_valid(field.tag.as_deref()) {
                continue;
            }
            let tags = ModelTags::parse(&field.name, field.tag.as_deref().unwrap_or_default())?;
            let relation = if tags::is_relation_field(&field.name) {
                let kind = RelationKind::parse(tags.rel_type()).ok_or_else(|| {
                    Error::InvalidRelation {
                        field: field.name.clone(),
                        value: tags.rel_type().to_string(),
                    }
                })?;
                Some(kind)
            } else {
                None
            };
            described.push(DescribedField {
                name: field.name,
                kind: field.kind,
                tags,
                relation,
            });
        }
        Ok(Self {
            table,
            fields: described,
        })
    }

    /// Describes a [`Model`] implementation.
    ///
    /// # Errors
    ///
    /// Fails like [`ModelDescriptor::new`].
    pub fn of<M: Model>() -> Result<Self> {
        Self::new(M::table_name(), M::fields())
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Returns the described fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[DescribedField] {
        &self.fields
    }

    /// Returns the column names in declaration order. Relation fields are
    /// not columns.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.relation.is_none())
            .map(DescribedField::column_name)
            .collect()
    }
}

impl Table {
    /// Builds the table for a registered model.
    #[must_use]
    pub fn from_model(model: &ModelDescriptor, dialect: Dialect) -> Self {
        let mut table = Self::new(model.table_name());
        for field in model.fields() {
            match (field.relation, field.related_table()) {
                (Some(kind), Some(to)) => {
                    table
                        .relations
                        .push(Relation::new(model.table_name(), to, kind));
                }
                _ => table.columns.push(Column::from_tags(
                    model.table_name(),
                    field.column_name(),
                    dialect.column_type(field.kind),
                    field.tags.clone(),
                )),
            }
        }
        table
    }
}

impl Migration {
    /// Builds the current schema: one table per model, in registration order.
    #[must_use]
    pub fn from_models(models: &[ModelDescriptor], dialect: Dialect) -> Self {
        let tables = models
            .iter()
            .map(|m| Table::from_model(m, dialect))
            .collect();
        let names: Vec<Value> = models
            .iter()
            .map(|m| Value::String(m.table_name().to_string()))
            .collect();
        Self {
            tables,
            models: Value::Array(names),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DbType;

    fn user_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("ID", FieldKind::Int64).tag("PRIMARY:true,AUTO:true"),
            FieldDef::new("Name", FieldKind::String).tag("LENGTH:255"),
            FieldDef::new("Secret", FieldKind::String),
            FieldDef::new("Ignored", FieldKind::String).tag("-"),
            FieldDef::new("Rel_group", FieldKind::Int64).tag("RELTYPE:FK"),
            FieldDef::new("Email", FieldKind::String).tag("UNIQUE:true,LENGTH:100"),
        ]
    }

    #[test]
    fn test_columns_skip_untagged_and_relations() {
        let desc = ModelDescriptor::new("user", user_fields()).unwrap();
        assert_eq!(desc.columns(), vec!["id", "name", "email"]);
    }

    #[test]
    fn test_table_from_model() {
        let desc = ModelDescriptor::new("user", user_fields()).unwrap();
        let table = Table::from_model(&desc, Dialect::MySql);

        assert_eq!(table.name, "user");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email"]);
        assert_eq!(table.columns[0].sql_type, DbType::BigInt);
        assert_eq!(table.columns[1].to_sql(), "name VARCHAR(255) NOT NULL");
        assert!(table.columns.iter().all(|c| c.table == "user"));

        assert_eq!(table.relations.len(), 1);
        assert_eq!(table.relations[0].from, "user");
        assert_eq!(table.relations[0].to, "group");
        assert_eq!(table.relations[0].kind, RelationKind::ForeignKey);
    }

    #[test]
    fn test_sqlite_dialect_types() {
        let desc = ModelDescriptor::new("user", user_fields()).unwrap();
        let table = Table::from_model(&desc, Dialect::Sqlite);
        assert_eq!(table.columns[0].sql_type.as_str(), "INTEGER");
        assert_eq!(table.columns[1].sql_type, DbType::Text);
    }

    #[test]
    fn test_malformed_tag_fails_registration() {
        let fields = vec![FieldDef::new("name", FieldKind::String).tag("LENGTH")];
        let err = ModelDescriptor::new("user", fields).unwrap_err();
        assert!(matches!(err, Error::InvalidTag { .. }));
    }

    #[test]
    fn test_unknown_reltype_fails_registration() {
        let fields = vec![FieldDef::new("rel_group", FieldKind::Int64).tag("RELTYPE:many")];
        let err = ModelDescriptor::new("user", fields).unwrap_err();
        match err {
            Error::InvalidRelation { field, value } => {
                assert_eq!(field, "rel_group");
                assert_eq!(value, "many");
            }
            other => panic!("Expected InvalidRelation, got {other:?}"),
        }

        let fields = vec![FieldDef::new("rel_group", FieldKind::Int64).tag("LENGTH:1")];
        assert!(ModelDescriptor::new("user", fields).is_err());
    }

    #[test]
    fn test_untagged_relation_field_is_skipped() {
        let fields = vec![FieldDef::new("rel_group", FieldKind::Int64)];
        let desc = ModelDescriptor::new("user", fields).unwrap();
        assert!(desc.fields().is_empty());
    }

    #[test]
    fn test_migration_from_models_keeps_order() {
        let a = ModelDescriptor::new("b_table", user_fields()).unwrap();
        let b = ModelDescriptor::new("a_table", user_fields()).unwrap();
        let migration = Migration::from_models(&[a, b], Dialect::MySql);
        let names: Vec<&str> = migration.table_names().collect();
        assert_eq!(names, vec!["b_table", "a_table"]);
        assert_eq!(migration.models, serde_json::json!(["b_table", "a_table"]));
    }
}
