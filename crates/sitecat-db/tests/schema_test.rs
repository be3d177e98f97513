//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    sitecat_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("snapshot"), "missing snapshot table");
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    sitecat_db::run_migrations(&db).await.unwrap();
    sitecat_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 2, "expected one record per migration");
}

#[tokio::test]
async fn snapshot_payload_must_be_a_string() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    sitecat_db::run_migrations(&db).await.unwrap();

    let result = db
        .query("CREATE snapshot:bad SET payload = 42")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "non-string payload should be rejected");
}

#[tokio::test]
async fn can_create_snapshot_after_migration() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    sitecat_db::run_migrations(&db).await.unwrap();

    db.query("CREATE snapshot:catalog SET payload = '[]'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let mut result = db
        .query("SELECT * FROM snapshot WHERE revision = 0")
        .await
        .unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1);
}
