//! Helpers for tests that run against a real PostgreSQL database

use crate::db::DatabasePool;
use replybox_common::config::DatabaseConfig;

/// Environment variable naming the test database
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// Connect to `TEST_DATABASE_URL` and run migrations.
///
/// Returns `None` when the variable is unset so database tests are skipped
/// on machines without PostgreSQL. Tests share the database and must not
/// assume it is empty.
pub async fn test_pool() -> Option<DatabasePool> {
    let url = std::env::var(TEST_DATABASE_URL).ok()?;
    let config = DatabaseConfig {
        url,
        max_connections: 5,
        ..DatabaseConfig::default()
    };

    let pool = DatabasePool::new(&config)
        .await
        .expect("Failed to connect to test database");
    pool.migrate().await.expect("Failed to run migrations");
    Some(pool)
}
