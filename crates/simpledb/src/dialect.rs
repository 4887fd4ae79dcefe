//! SQL dialects.
//!
//! A dialect decides which column type a model field gets when its annotation
//! carries no explicit `TYPE`.

use std::fmt;

use crate::model::FieldKind;
use crate::schema::DbType;

/// Database dialect used for type resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// MySQL / MariaDB.
    #[default]
    MySql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Returns the dialect name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Maps a field kind to a column type.
    #[must_use]
    pub fn column_type(self, kind: FieldKind) -> DbType {
        match self {
            Self::MySql => match kind {
                FieldKind::String | FieldKind::Other => DbType::Varchar,
                FieldKind::Int | FieldKind::Int32 => DbType::Int,
                FieldKind::Int8 => DbType::TinyInt,
                FieldKind::Int16 => DbType::SmallInt,
                FieldKind::Int64 => DbType::BigInt,
                FieldKind::Float32 => DbType::Float,
                FieldKind::Float64 => DbType::Double,
                FieldKind::Bool => DbType::Boolean,
                FieldKind::Time => DbType::DateTime,
                FieldKind::Bytes => DbType::Blob,
            },
            Self::Sqlite => match kind {
                FieldKind::String | FieldKind::Other => DbType::Text,
                FieldKind::Int
                | FieldKind::Int8
                | FieldKind::Int16
                | FieldKind::Int32
                | FieldKind::Int64 => DbType::Custom("INTEGER".to_string()),
                FieldKind::Float32 | FieldKind::Float64 => DbType::Float,
                FieldKind::Bool => DbType::Boolean,
                FieldKind::Time => DbType::DateTime,
                FieldKind::Bytes => DbType::Blob,
            },
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_type_map() {
        let d = Dialect::MySql;
        assert_eq!(d.column_type(FieldKind::String), DbType::Varchar);
        assert_eq!(d.column_type(FieldKind::Int8), DbType::TinyInt);
        assert_eq!(d.column_type(FieldKind::Int16), DbType::SmallInt);
        assert_eq!(d.column_type(FieldKind::Int32), DbType::Int);
        assert_eq!(d.column_type(FieldKind::Int64), DbType::BigInt);
        assert_eq!(d.column_type(FieldKind::Float64), DbType::Double);
        assert_eq!(d.column_type(FieldKind::Time), DbType::DateTime);
        assert_eq!(d.column_type(FieldKind::Other), DbType::Varchar);
    }

    #[test]
    fn test_sqlite_type_map() {
        let d = Dialect::Sqlite;
        assert_eq!(d.column_type(FieldKind::String), DbType::Text);
        assert_eq!(d.column_type(FieldKind::Int64).as_str(), "INTEGER");
        assert_eq!(d.column_type(FieldKind::Int8).as_str(), "INTEGER");
        assert_eq!(d.column_type(FieldKind::Float32), DbType::Float);
        assert_eq!(d.column_type(FieldKind::Bytes), DbType::Blob);
    }

    #[test]
    fn test_default_is_mysql() {
        assert_eq!(Dialect::default(), Dialect::MySql);
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
    }
}
