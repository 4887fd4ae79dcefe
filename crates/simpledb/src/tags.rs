//! Field annotation parsing.
//!
//! A model field is described by an annotation string made of `KEY:value`
//! pairs separated by commas, for example `"LENGTH:255,NULLABLE:true"`.
//! A bare `+` token is ignored. Fields annotated with nothing or with `"-"`
//! are not part of the schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum column length.
pub const LENGTH: &str = "LENGTH";
/// Whether the column allows NULL.
pub const NULLABLE: &str = "NULLABLE";
/// Whether the column is UNIQUE.
pub const UNIQUE: &str = "UNIQUE";
/// Whether the column is the PRIMARY KEY.
pub const PRIMARY: &str = "PRIMARY";
/// Whether the column gets an INDEX.
pub const INDEX: &str = "INDEX";
/// Whether the column auto-increments.
pub const AUTO: &str = "AUTO";
/// Column default, rendered verbatim.
pub const DEFAULT: &str = "DEFAULT";
/// Relation kind of a relation field.
pub const RELTYPE: &str = "RELTYPE";
/// Raw SQL that replaces every structured modifier.
pub const RAW: &str = "RAW";
/// Explicit column type.
pub const TYPE: &str = "TYPE";

/// Prefix marking a field as a relation to another table.
pub const RELATION_PREFIX: &str = "rel_";

/// Returns whether an annotation puts its field into the schema.
#[must_use]
pub fn tag_valid(tag: Option<&str>) -> bool {
    !matches!(tag, None | Some("" | "-"))
}

/// Returns whether a field name marks a relation field.
#[must_use]
pub fn is_relation_field(name: &str) -> bool {
    name.get(..RELATION_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RELATION_PREFIX))
}

/// Parsed annotation of a single field.
///
/// The typed accessors follow a default-on-error policy: a missing or
/// unparseable value yields the type's zero value (`0`, `false`, `""`).
/// They never report parse failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelTags(BTreeMap<String, String>);

impl ModelTags {
    /// Creates an empty tag map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an annotation string.
    ///
    /// `field` is only used to name the field in errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] for a token without a `:` separator.
    pub fn parse(field: &str, tag: &str) -> Result<Self> {
        let mut tags = Self::new();
        for token in tag.split(',') {
            if token.trim() == "+" {
                continue;
            }
            let Some((key, value)) = token.split_once(':') else {
                return Err(Error::InvalidTag {
                    field: field.to_string(),
                    tag: token.to_string(),
                });
            };
            tags.set(key.trim(), value.trim());
        }
        Ok(tags)
    }

    /// Returns the raw value of a key, or `""` if absent.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map_or("", String::as_str)
    }

    /// Sets a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns whether a key is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Column length, `0` when absent or not a number.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.get(LENGTH).parse().unwrap_or(0)
    }

    /// Whether the column is nullable.
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.flag(NULLABLE)
    }

    /// Whether the column is unique.
    #[must_use]
    pub fn unique(&self) -> bool {
        self.flag(UNIQUE)
    }

    /// Whether the column is a primary key.
    #[must_use]
    pub fn primary(&self) -> bool {
        self.flag(PRIMARY)
    }

    /// Whether the column needs an index.
    #[must_use]
    pub fn index(&self) -> bool {
        self.flag(INDEX)
    }

    /// Whether the column auto-increments.
    #[must_use]
    pub fn auto(&self) -> bool {
        self.flag(AUTO)
    }

    /// Default value, rendered verbatim after `DEFAULT`.
    #[must_use]
    pub fn default_value(&self) -> &str {
        self.get(DEFAULT)
    }

    /// Relation kind as written in the annotation.
    #[must_use]
    pub fn rel_type(&self) -> &str {
        self.get(RELTYPE)
    }

    /// Raw SQL override.
    ///
    /// ```ignore
    /// #[simpledb("RAW:NOT NULL PRIMARY KEY AUTO_INCREMENT")]
    /// id: i64,
    /// ```
    #[must_use]
    pub fn raw(&self) -> &str {
        self.get(RAW)
    }

    /// Explicit column type.
    #[must_use]
    pub fn type_override(&self) -> &str {
        self.get(TYPE)
    }

    /// Iterates over all key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn flag(&self, key: &str) -> bool {
        parse_bool(self.get(key)).unwrap_or(false)
    }
}

/// Accepts the spellings `1 t T TRUE true True 0 f F FALSE false False`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
