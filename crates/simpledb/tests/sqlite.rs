//! Migration runs against an in-memory SQLite database.
//!
//! The models stick to DDL SQLite understands: raw overrides for the
//! primary key and defaults for columns added to existing tables. Junction
//! tables are created by hand since their DDL is MySQL flavoured.

use simpledb::prelude::*;
use simpledb_derive::Model;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone, PartialEq, Model, sqlx::FromRow)]
struct Item {
    #[simpledb("RAW:PRIMARY KEY AUTOINCREMENT")]
    id: i64,
    #[simpledb("+")]
    name: String,
}

#[allow(dead_code)]
#[derive(Model)]
#[simpledb(table = "item")]
struct ItemWithStock {
    #[simpledb("RAW:PRIMARY KEY AUTOINCREMENT")]
    id: i64,
    #[simpledb("+")]
    name: String,
    #[simpledb("DEFAULT:0")]
    stock: i32,
    #[simpledb("NULLABLE:true")]
    note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Model, sqlx::FromRow)]
struct Warehouse {
    #[simpledb("RAW:PRIMARY KEY AUTOINCREMENT")]
    id: i64,
    #[simpledb("NULLABLE:true")]
    city: Option<String>,
}

async fn setup_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap()
}

async fn table_columns(pool: &SqlitePool, table: &str) -> Vec<String> {
    sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{table}')"))
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .unwrap();
    count > 0
}

fn sqlite_db(pool: &SqlitePool, dir: &std::path::Path) -> Database<SqlitePool> {
    Database::new(pool.clone())
        .with_dialect(Dialect::Sqlite)
        .with_store(SnapshotStore::new(dir))
}

#[tokio::test]
async fn test_create_and_use_table() {
    let pool = setup_pool().await;
    let tmp = tempfile::tempdir().unwrap();
    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<Item>().unwrap();

    let report = db.migrate().await.unwrap();
    assert_eq!(
        report.statements,
        vec!["CREATE TABLE item (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)"
            .to_string()]
    );

    let (sql, values) = (
        simpledb::query::insert_query("item", &["name"]),
        vec![SqlValue::Text("bolt".into())],
    );
    let result = db.execute(&sql, &values).await.unwrap();
    assert_eq!(result.rows_affected, 1);
    assert_eq!(result.last_insert_id, 1);

    let (sql, values) = db.query_set::<Item>().get(1).unwrap().build();
    let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
    for value in values {
        if let SqlValue::Int(id) = value {
            query = query.bind(id);
        }
    }
    let row = query.fetch_one(&pool).await.unwrap();
    assert_eq!(row, (1, "bolt".to_string()));

    assert!(db.migrate().await.unwrap_err().is_no_changes());
}

#[tokio::test]
async fn test_add_and_drop_columns() {
    let pool = setup_pool().await;
    let tmp = tempfile::tempdir().unwrap();
    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<Item>().unwrap();
    db.migrate().await.unwrap();
    db.execute("INSERT INTO item (name) VALUES (?)", &["bolt".to_sql_value()])
        .await
        .unwrap();

    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<ItemWithStock>().unwrap();
    let report = db.migrate().await.unwrap();
    assert_eq!(
        report.statements,
        vec![
            "ALTER TABLE item ADD COLUMN stock INTEGER NOT NULL DEFAULT 0".to_string(),
            "ALTER TABLE item ADD COLUMN note TEXT NULL".to_string(),
        ]
    );
    assert_eq!(
        table_columns(&pool, "item").await,
        vec!["id", "name", "stock", "note"]
    );
    let stock: i64 = sqlx::query_scalar("SELECT stock FROM item WHERE name = 'bolt'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stock, 0);

    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<Item>().unwrap();
    let report = db.migrate().await.unwrap();
    assert_eq!(report.operations, 2);
    assert_eq!(table_columns(&pool, "item").await, vec!["id", "name"]);

    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<Item>().unwrap();
    assert!(db.migrate().await.unwrap_err().is_no_changes());
}

#[tokio::test]
async fn test_drop_removed_table() {
    let pool = setup_pool().await;
    let tmp = tempfile::tempdir().unwrap();
    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<Item>().unwrap();
    db.register::<Warehouse>().unwrap();
    assert_eq!(db.migrate().await.unwrap().operations, 2);
    assert!(table_exists(&pool, "warehouse").await);

    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<Item>().unwrap();
    let report = db.migrate().await.unwrap();

    assert_eq!(report.statements, vec!["DROP TABLE warehouse".to_string()]);
    assert!(!table_exists(&pool, "warehouse").await);
    assert!(table_exists(&pool, "item").await);
}

#[tokio::test]
async fn test_failed_statement_names_table() {
    let pool = setup_pool().await;
    sqlx::query("CREATE TABLE warehouse (id INTEGER)")
        .execute(&pool)
        .await
        .unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let mut db = sqlite_db(&pool, tmp.path());
    db.register::<Warehouse>().unwrap();
    let err = db.migrate().await.unwrap_err();

    match err {
        Error::Statement { target, .. } => assert_eq!(target, "warehouse"),
        other => panic!("Expected Statement error, got {other:?}"),
    }
    assert!(db.store().list().unwrap().is_empty());
}

async fn item_db(pool: &SqlitePool, dir: &std::path::Path) -> Database<SqlitePool> {
    let mut db = sqlite_db(pool, dir);
    db.register::<Item>().unwrap();
    db.register::<Warehouse>().unwrap();
    db.migrate().await.unwrap();
    db
}

fn item(name: &str) -> Item {
    Item {
        id: 0,
        name: name.to_string(),
    }
}

#[tokio::test]
async fn test_model_insert_update_delete() {
    let pool = setup_pool().await;
    let tmp = tempfile::tempdir().unwrap();
    let db = item_db(&pool, tmp.path()).await;

    let first = db.insert_model(&item("bolt")).await.unwrap();
    let second = db.insert_model(&item("nut")).await.unwrap();
    assert_eq!((first, second), (1, 2));

    let mut nut: Item = db
        .fetch_one(db.query_set::<Item>().get(second).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nut.name, "nut");

    nut.name = "wing nut".to_string();
    assert_eq!(db.update_model(&nut).await.unwrap().rows_affected, 1);
    let items: Vec<Item> = db.all::<Item, Item>().await.unwrap();
    assert_eq!(items, vec![nut.clone(), Item { id: 1, name: "bolt".into() }]);

    assert_eq!(db.delete_model(&nut).await.unwrap().rows_affected, 1);
    let items: Vec<Item> = db.all::<Item, Item>().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "bolt");
}

#[tokio::test]
async fn test_filter_count_and_pages() {
    let pool = setup_pool().await;
    let tmp = tempfile::tempdir().unwrap();
    let db = item_db(&pool, tmp.path()).await;
    for name in ["bolt", "nut", "washer", "screw", "nail"] {
        db.insert_model(&item(name)).await.unwrap();
    }

    let filters = Filters::new().add("name", Operator::Like, "n%");
    let found: Vec<Item> = db.filter::<Item, Item>(&filters).await.unwrap();
    let names: Vec<&str> = found.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["nail", "nut"]);

    assert_eq!(db.count("item", &filters).await.unwrap(), 2);
    assert_eq!(db.count("item", &Filters::new()).await.unwrap(), 5);

    let none = Filters::new().add_in("name", Vec::<String>::new());
    assert_eq!(db.count("item", &none).await.unwrap(), 0);

    let page = db
        .query_set::<Item>()
        .page_size(2)
        .page(2)
        .unwrap();
    let rows: Vec<Item> = db.fetch(&page).await.unwrap();
    let ids: Vec<i64> = rows.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![3, 4]);

    let missing: Option<Item> = db
        .fetch_one(db.query_set::<Item>().get(42).unwrap())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_related_rows() {
    let pool = setup_pool().await;
    let tmp = tempfile::tempdir().unwrap();
    let db = item_db(&pool, tmp.path()).await;
    db.execute(
        "CREATE TABLE item_warehouse (id INTEGER PRIMARY KEY, item_id INTEGER, warehouse_id INTEGER)",
        &[],
    )
    .await
    .unwrap();

    let bolt = db.insert_model(&item("bolt")).await.unwrap();
    let nut = db.insert_model(&item("nut")).await.unwrap();
    let north = db
        .insert_model(&Warehouse { id: 0, city: Some("Oslo".into()) })
        .await
        .unwrap();
    db.insert_relation("item", "warehouse", bolt, north).await.unwrap();
    db.insert_relation("item", "warehouse", nut, north).await.unwrap();

    let stored: Vec<Warehouse> = db
        .select_related("item", "warehouse", bolt)
        .await
        .unwrap();
    assert_eq!(stored, vec![Warehouse { id: north, city: Some("Oslo".into()) }]);

    let items: Vec<Item> = db
        .select_related_reverse("item", "warehouse", north)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    db.delete_relation("item", "warehouse", nut, north).await.unwrap();
    let items: Vec<Item> = db
        .select_related_reverse("item", "warehouse", north)
        .await
        .unwrap();
    assert_eq!(items, vec![Item { id: bolt, name: "bolt".into() }]);
}

#[tokio::test]
async fn test_one_to_one_rows() {
    let pool = setup_pool().await;
    let tmp = tempfile::tempdir().unwrap();
    let db = item_db(&pool, tmp.path()).await;
    db.execute(
        "CREATE TABLE shelf (id INTEGER PRIMARY KEY, warehouse_id INTEGER)",
        &[],
    )
    .await
    .unwrap();
    db.execute("INSERT INTO shelf (warehouse_id) VALUES (?), (?)", &[SqlValue::Int(4), SqlValue::Null])
        .await
        .unwrap();

    let linked: Vec<(i64, Option<i64>)> = db.select_one_to_one("shelf", "warehouse").await.unwrap();
    assert_eq!(linked, vec![(1, Some(4))]);
}
