//! Unit tests for database initialization
//!
//! Tests cover:
//! - Automatic database creation on first run
//! - Reopening an existing database
//! - Per-connection pragmas
//! - Schema idempotence under concurrent startup

use bizlink_common::db::{create_schema, init_database, init_memory_database};
use tempfile::TempDir;

const EXPECTED_TABLES: &[&str] = &[
    "identities",
    "categories",
    "subcategories",
    "subsubcategories",
    "identity_members",
    "users",
    "user_taxonomy",
    "content_items",
    "content_audience",
    "connections",
    "connection_requests",
    "likes",
    "comments",
    "job_applications",
    "event_registrations",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("bizlink.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("bizlink.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO categories (id, name) VALUES ('5', 'Technology')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let name: String = sqlx::query_scalar("SELECT name FROM categories WHERE id = '5'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(name, "Technology");
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    for table in EXPECTED_TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "Missing table {}", table);
    }
}

#[tokio::test]
async fn test_foreign_keys_enabled() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("bizlink.db")).await.unwrap();

    let fk_enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(fk_enabled, 1, "Foreign keys should be enabled");

    let orphan = sqlx::query(
        "INSERT INTO subcategories (id, name, category_id) VALUES ('50', 'Software', 'missing')",
    )
    .execute(&pool)
    .await;
    assert!(orphan.is_err(), "Orphan subcategory should be rejected");
}

#[tokio::test]
async fn test_busy_timeout_set() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("bizlink.db")).await.unwrap();

    let timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(timeout, 5000, "Busy timeout should be 5000ms");
}

#[tokio::test]
async fn test_schema_reapplied_without_error() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query("INSERT INTO users (id, name) VALUES ('u1', 'Ada')")
        .execute(&pool)
        .await
        .unwrap();

    create_schema(&pool).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "Re-applying the schema must keep existing rows");
}

#[tokio::test]
async fn test_concurrent_initialization() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("bizlink.db");

    let mut handles = vec![];
    for _ in 0..5 {
        let db_path = db_path.clone();
        handles.push(tokio::spawn(async move { init_database(&db_path).await }));
    }

    let mut results = vec![];
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    for result in &results {
        assert!(result.is_ok(), "Concurrent initialization failed: {:?}", result);
    }

    let pool = results[0].as_ref().unwrap();
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'content_items'",
    )
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}
