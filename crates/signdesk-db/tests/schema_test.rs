//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    signdesk_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("user"), "missing user table");
    assert!(info_str.contains("user_profile"), "missing user_profile table");
    assert!(info_str.contains("identity"), "missing identity table");
    assert!(info_str.contains("session"), "missing session table");
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    // Second run is a no-op.
    signdesk_db::run_migrations(&db).await.unwrap();
    signdesk_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(
        records.len(),
        signdesk_db::latest_version() as usize,
        "expected one record per migration"
    );
}

#[tokio::test]
async fn status_outside_enum_is_rejected() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    signdesk_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE user SET \
             username = 'mallory', email = 'm@example.com', \
             first_name = 'M', last_name = 'X', \
             status = 'banned'",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "status must be active, suspended or deleted");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_usernames() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    signdesk_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE user SET \
         username = 'ana', email = 'ana@example.com', \
         first_name = 'Ana', last_name = 'Lopez'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let result = db
        .query(
            "CREATE user SET \
             username = 'ana', email = 'other@example.com', \
             first_name = 'Ana', last_name = 'Other'",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate username should be rejected");
}
