//! Schema differ.
//!
//! Compares the schema built from the registered models against the last
//! persisted snapshot. Tables and columns are matched by name, relations by
//! their unordered table pair.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::schema::{Column, Migration, Relation, Table};

/// Differences between the current schema and a persisted snapshot.
///
/// Every list is in a deterministic order: current-schema order for missing
/// and different items, persisted order for removed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Tables to create. Their columns and relations travel with them.
    pub missing_tables: Vec<Table>,
    /// Columns to add to existing tables.
    pub missing_columns: Vec<Column>,
    /// Relations to create between existing tables.
    pub missing_relations: Vec<Relation>,
    /// Columns whose definition changed (current definition).
    pub different_columns: Vec<Column>,
    /// Tables to drop, with the relations they declared.
    pub removed_tables: Vec<Table>,
    /// Columns to drop from existing tables.
    pub removed_columns: Vec<Column>,
    /// Relations to drop between existing tables.
    pub removed_relations: Vec<Relation>,
}

impl SchemaDiff {
    /// Returns whether there is nothing to migrate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of detected changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.missing_tables.len()
            + self.missing_columns.len()
            + self.missing_relations.len()
            + self.different_columns.len()
            + self.removed_tables.len()
            + self.removed_columns.len()
            + self.removed_relations.len()
    }
}

impl Migration {
    /// Compares this (current) schema against a persisted one.
    #[must_use]
    pub fn diff(&self, persisted: &Migration) -> SchemaDiff {
        let mut diff = SchemaDiff::default();

        let persisted_tables: HashMap<&str, &Table> = persisted
            .tables
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect();
        let current_names: HashSet<&str> = self.table_names().collect();

        for table in &self.tables {
            match persisted_tables.get(table.name.as_str()) {
                None => {
                    debug!(table = %table.name, "Detected missing table");
                    diff.missing_tables.push(table.clone());
                }
                Some(old) => diff_table(table, old, &mut diff),
            }
        }

        for table in &persisted.tables {
            if !current_names.contains(table.name.as_str()) {
                debug!(table = %table.name, "Detected removed table");
                diff.removed_tables.push(table.clone());
            }
        }

        diff
    }
}

fn diff_table(current: &Table, persisted: &Table, diff: &mut SchemaDiff) {
    let old_columns: HashMap<&str, &Column> = persisted
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect();
    let new_columns: HashSet<&str> = current.columns.iter().map(|c| c.name.as_str()).collect();

    for column in &current.columns {
        match old_columns.get(column.name.as_str()) {
            None => {
                debug!(table = %current.name, column = %column.name, "Detected missing column");
                diff.missing_columns.push(column.clone());
            }
            Some(old) if old.to_sql() != column.to_sql() => {
                debug!(
                    table = %current.name,
                    column = %column.name,
                    from = %old,
                    to = %column,
                    "Detected changed column"
                );
                diff.different_columns.push(column.clone());
            }
            Some(_) => {}
        }
    }

    for column in &persisted.columns {
        if !new_columns.contains(column.name.as_str()) {
            debug!(table = %current.name, column = %column.name, "Detected removed column");
            diff.removed_columns.push(column.clone());
        }
    }

    for relation in &current.relations {
        if !persisted.relations.iter().any(|r| r.same_tables(relation)) {
            debug!(relation = %relation, "Detected missing relation");
            diff.missing_relations.push(relation.clone());
        }
    }

    for relation in &persisted.relations {
        if !current.relations.iter().any(|r| r.same_tables(relation)) {
            debug!(relation = %relation, "Detected removed relation");
            diff.removed_relations.push(relation.clone());
        }
    }
}
