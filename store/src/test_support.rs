use sqlx::SqlitePool;

use crate::config::StoreConfig;

/// Fresh in-memory database with the full schema applied.
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = StoreConfig::in_memory()
        .create_pool()
        .await
        .expect("failed to open in-memory database");
    crate::run_migrations(&pool)
        .await
        .expect("failed to run migrations");
    pool
}
