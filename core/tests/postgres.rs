#![cfg(feature = "postgres")]
//! Runs against a live server when `FARME_TEST_POSTGRES_URL` is set, and is skipped otherwise.

use std::fs;

use farme_core::config::{ConnectionConfig, DatabaseConfig};
use farme_core::migration::{Migrations, Migrator};
use farme_core::model::{Cast, Model, ModelConfig};
use farme_core::{table, Database, Row, Value};

const LEDGER: &str = "farme_test_migrations";

fn database() -> Option<Database> {
    let url = std::env::var("FARME_TEST_POSTGRES_URL").ok()?;
    let mut config = DatabaseConfig::single(ConnectionConfig::from_url(&url).unwrap());
    config.migration.table = LEDGER.to_string();
    let mut db = Database::new(config).unwrap();
    db.connection(None)
        .unwrap()
        .execute_batch(&format!("DROP TABLE IF EXISTS farme_pg_posts; DROP TABLE IF EXISTS {LEDGER}"))
        .unwrap();
    Some(db)
}

#[test]
fn migrations_and_models_on_postgres() {
    let Some(mut db) = database() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let name = "2024_01_01_000000_create_farme_pg_posts_table";
    fs::write(
        dir.path().join(format!("{name}.up.sql")),
        "CREATE TABLE farme_pg_posts (
            id SERIAL PRIMARY KEY,
            title VARCHAR(255) NOT NULL,
            published BOOLEAN DEFAULT FALSE,
            created_at TIMESTAMP,
            updated_at TIMESTAMP
        );",
    )
    .unwrap();
    fs::write(dir.path().join(format!("{name}.down.sql")), "DROP TABLE farme_pg_posts;").unwrap();
    let migrations = Migrations::discover(dir.path()).unwrap();

    let mut migrator = Migrator::for_database(&mut db, None).unwrap();
    let report = migrator.run(&migrations).unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.completed, vec![name]);
    let records = migrator.records().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].executed_at.is_empty());
    assert!(migrator.run(&migrations).unwrap().completed.is_empty());

    let posts = Model::new(
        ModelConfig::new("post")
            .table("farme_pg_posts")
            .fillable(["title", "published"])
            .cast("published", Cast::Bool)
            .cast("created_at", Cast::DateTime),
    );
    let mut data = Row::new();
    data.insert("title".into(), Value::from("Hello"));
    data.insert("published".into(), Value::Bool(true));
    let created = posts.create(&mut db, data).unwrap().unwrap();
    assert!(!created["created_at"].is_null());
    let id = created["id"].as_i64().unwrap();

    // Route ids arrive as text; generated handlers parse integer keys before querying.
    let parsed: i64 = id.to_string().parse().unwrap();
    let found = table("farme_pg_posts").where_("id", parsed).first(&mut db).unwrap();
    assert_eq!(found.map(|r| r["title"].clone()), Some(Value::from("Hello")));

    let mut edit = Row::new();
    edit.insert("title".into(), Value::from("Edited"));
    let updated = posts.update(&mut db, parsed, edit).unwrap().unwrap();
    assert_eq!(updated["title"], Value::from("Edited"));
    assert_eq!(posts.delete(&mut db, parsed).unwrap(), 1);

    let mut migrator = Migrator::for_database(&mut db, None).unwrap();
    assert!(migrator.reset(&migrations).unwrap().is_success());
}
