pub mod assignment;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fixture;
pub mod games;
pub mod progress;
pub mod retry;
pub mod submissions;

#[cfg(test)]
pub(crate) mod test_support;

pub use assignment::AssignmentStore;
pub use catalog::CatalogStore;
pub use config::StoreConfig;
pub use error::StoreError;
pub use fixture::{seed_catalog, CatalogFixture};
pub use games::GameStore;
pub use progress::ProgressStore;
pub use retry::retry_on_unavailable;
pub use submissions::{SqliteSubmissionLog, SubmissionLog, SubmissionStore};

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// NoopSubmissionLog for when attempt history is not needed
pub struct NoopSubmissionLog;

#[async_trait::async_trait]
impl submissions::SubmissionLog for NoopSubmissionLog {
    async fn append(
        &self,
        _attempt: &types::SubmissionAttempt,
    ) -> Result<Option<types::AttemptId>, error::StoreError> {
        Ok(None)
    }

    async fn attempts_for(
        &self,
        _team_id: types::TeamId,
        _game_task_id: types::GameTaskId,
    ) -> Result<Vec<types::SubmissionAttempt>, error::StoreError> {
        Ok(Vec::new())
    }
}
