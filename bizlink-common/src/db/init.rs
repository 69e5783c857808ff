//! Database initialization
//!
//! Opens (or creates) the SQLite database and applies the schema. Every
//! statement is `CREATE ... IF NOT EXISTS`, so running it against an existing
//! database is a no-op.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
///
/// Journal mode, busy timeout and foreign keys are set per connection, so
/// every pooled connection carries them.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .min_connections(2)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Each SQLite `:memory:` connection is its own database, so the pool is
/// pinned to one connection that is never recycled.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table and index used by the service
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_taxonomy_tables(pool).await?;
    create_user_tables(pool).await?;
    create_content_tables(pool).await?;
    create_social_tables(pool).await?;

    Ok(())
}

async fn create_taxonomy_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subcategories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subsubcategories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subcategory_id TEXT NOT NULL REFERENCES subcategories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // level: 'category' | 'subcategory' | 'subsubcategory'
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identity_members (
            identity_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
            level TEXT NOT NULL,
            node_id TEXT NOT NULL,
            PRIMARY KEY (identity_id, level, node_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            headline TEXT,
            city TEXT,
            country TEXT,
            connections_only INTEGER NOT NULL DEFAULT 0,
            content_types TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // facet: 'offering' | 'interest'; level: 'identity' | 'category' | ...
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_taxonomy (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            facet TEXT NOT NULL,
            level TEXT NOT NULL,
            taxonomy_id TEXT NOT NULL,
            PRIMARY KEY (user_id, facet, level, taxonomy_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_content_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_items (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            owner_id TEXT NOT NULL,
            city TEXT,
            country TEXT,
            category_id TEXT,
            subcategory_id TEXT,
            subsubcategory_id TEXT,
            industry_category_id TEXT,
            details TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_content_items_kind_created ON content_items(kind, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_audience (
            item_id TEXT NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
            level TEXT NOT NULL,
            taxonomy_id TEXT NOT NULL,
            PRIMARY KEY (item_id, level, taxonomy_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_social_tables(pool: &SqlitePool) -> Result<()> {
    // One row per direction so lookups never need an OR
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS connections (
            user_id TEXT NOT NULL,
            peer_id TEXT NOT NULL,
            PRIMARY KEY (user_id, peer_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS connection_requests (
            from_user_id TEXT NOT NULL,
            to_user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            PRIMARY KEY (from_user_id, to_user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS likes (
            item_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (item_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_applications (
            job_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'submitted',
            PRIMARY KEY (job_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_registrations (
            event_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'registered',
            PRIMARY KEY (event_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'content_items'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
