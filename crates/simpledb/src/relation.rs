//! SQL for relations between tables.
//!
//! A foreign-key relation `a -> b` is backed by a junction table `a_b` with
//! the columns `a_id` and `b_id`. A one-to-one relation is a constraint named
//! `fk_<to>` on the `from` table.

use crate::schema::{Relation, RelationKind};

/// `CREATE TABLE IF NOT EXISTS` statement for the junction table of `from -> to`.
#[must_use]
pub fn create_junction_table_sql(from: &str, to: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {from}_{to} (id BIGINT PRIMARY KEY AUTO_INCREMENT, \
         {from}_id BIGINT, {to}_id BIGINT, \
         FOREIGN KEY ({from}_id) REFERENCES {from}(id), \
         FOREIGN KEY ({to}_id) REFERENCES {to}(id))"
    )
}

/// `DROP TABLE IF EXISTS` statement for the junction table of `from -> to`.
#[must_use]
pub fn drop_junction_table_sql(from: &str, to: &str) -> String {
    format!("DROP TABLE IF EXISTS {from}_{to}")
}

/// Adds the one-to-one constraint `fk_<to>` to `from`.
#[must_use]
pub fn add_one_to_one_sql(from: &str, to: &str) -> String {
    format!("ALTER TABLE {from} ADD CONSTRAINT fk_{to} FOREIGN KEY ({to}_id) REFERENCES {to}(id)")
}

/// Drops the one-to-one constraint `fk_<to>` from `from`.
#[must_use]
pub fn drop_one_to_one_sql(from: &str, to: &str) -> String {
    format!("ALTER TABLE {from} DROP FOREIGN KEY fk_{to}")
}

/// Statement creating a relation on tables that already exist.
///
/// Returns `None` for one-to-many relations, which have no DDL.
#[must_use]
pub fn create_relation_sql(relation: &Relation) -> Option<String> {
    match relation.kind {
        RelationKind::ForeignKey => Some(create_junction_table_sql(&relation.from, &relation.to)),
        RelationKind::OneToOne => Some(add_one_to_one_sql(&relation.from, &relation.to)),
        RelationKind::OneToMany => None,
    }
}

/// Statement dropping a relation. `None` for one-to-many relations.
#[must_use]
pub fn drop_relation_sql(relation: &Relation) -> Option<String> {
    match relation.kind {
        RelationKind::ForeignKey => Some(drop_junction_table_sql(&relation.from, &relation.to)),
        RelationKind::OneToOne => Some(drop_one_to_one_sql(&relation.from, &relation.to)),
        RelationKind::OneToMany => None,
    }
}

/// Inserts a row linking `from_id` and `to_id` into the junction table.
/// Binds two values: the `from` id then the `to` id.
#[must_use]
pub fn insert_relation_sql(from: &str, to: &str) -> String {
    format!("INSERT INTO {from}_{to} ({from}_id, {to}_id) VALUES (?, ?)")
}

/// Deletes the junction row linking two ids. Binds the `from` id then the
/// `to` id.
#[must_use]
pub fn delete_relation_sql(from: &str, to: &str) -> String {
    format!("DELETE FROM {from}_{to} WHERE {from}_id = ? AND {to}_id = ?")
}

/// Selects the `to` rows linked to one `from` id.
#[must_use]
pub fn select_related_sql(from: &str, to: &str) -> String {
    format!("SELECT * FROM {to} WHERE id IN (SELECT {to}_id FROM {from}_{to} WHERE {from}_id = ?)")
}

/// Selects the `from` rows linked to one `to` id.
#[must_use]
pub fn select_related_reverse_sql(from: &str, to: &str) -> String {
    format!(
        "SELECT * FROM {from} WHERE id IN (SELECT {from}_id FROM {from}_{to} WHERE {to}_id = ?)"
    )
}

/// Selects the `from` rows holding a one-to-one link to `to`.
#[must_use]
pub fn select_one_to_one_sql(from: &str, to: &str) -> String {
    format!("SELECT * FROM {from} WHERE {to}_id IS NOT NULL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_junction_table() {
        assert_eq!(
            create_junction_table_sql("user", "group"),
            "CREATE TABLE IF NOT EXISTS user_group (id BIGINT PRIMARY KEY AUTO_INCREMENT, \
             user_id BIGINT, group_id BIGINT, \
             FOREIGN KEY (user_id) REFERENCES user(id), \
             FOREIGN KEY (group_id) REFERENCES group(id))"
        );
        assert_eq!(drop_junction_table_sql("user", "group"), "DROP TABLE IF EXISTS user_group");
    }

    #[test]
    fn test_one_to_one_references_target() {
        assert_eq!(
            add_one_to_one_sql("user", "profile"),
            "ALTER TABLE user ADD CONSTRAINT fk_profile FOREIGN KEY (profile_id) REFERENCES profile(id)"
        );
        assert_eq!(
            drop_one_to_one_sql("user", "profile"),
            "ALTER TABLE user DROP FOREIGN KEY fk_profile"
        );
    }

    #[test]
    fn test_one_to_many_has_no_ddl() {
        let rel = Relation::new("user", "post", RelationKind::OneToMany);
        assert!(create_relation_sql(&rel).is_none());
        assert!(drop_relation_sql(&rel).is_none());
    }

    #[test]
    fn test_junction_rows() {
        assert_eq!(
            insert_relation_sql("user", "group"),
            "INSERT INTO user_group (user_id, group_id) VALUES (?, ?)"
        );
        assert_eq!(
            delete_relation_sql("user", "group"),
            "DELETE FROM user_group WHERE user_id = ? AND group_id = ?"
        );
        assert_eq!(
            select_related_sql("user", "group"),
            "SELECT * FROM group WHERE id IN (SELECT group_id FROM user_group WHERE user_id = ?)"
        );
        assert_eq!(
            select_related_reverse_sql("user", "group"),
            "SELECT * FROM user WHERE id IN (SELECT user_id FROM user_group WHERE group_id = ?)"
        );
        assert_eq!(
            select_one_to_one_sql("user", "profile"),
            "SELECT * FROM user WHERE profile_id IS NOT NULL"
        );
    }
}
