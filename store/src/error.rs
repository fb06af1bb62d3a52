use sqlx::error::ErrorKind;
use thiserror::Error;
use types::{GameId, GameMarkId, GameTaskId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid game window: {0}")]
    InvalidWindow(String),

    #[error("Duplicate assignment: {0}")]
    DuplicateAssignment(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown assignment: {0}")]
    UnknownAssignment(String),

    #[error("Cross-game reference: {0}")]
    CrossGameReference(String),

    #[error("Game task {0} already has a correct answer")]
    TaskAlreadyAnswered(GameTaskId),

    #[error("Game mark {0} is already the correct answer for another task")]
    MarkAlreadyUsed(GameMarkId),

    #[error("Game {0} is not open")]
    GameClosed(GameId),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("UUID parsing error: {0}")]
    UuidParsing(#[from] uuid::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Transient errors worth retrying; everything else is a hard failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_unavailable(&e) {
            return StoreError::Unavailable(e.to_string());
        }
        if let sqlx::Error::Database(ref db) = e {
            match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    return StoreError::ConstraintViolation(db.message().to_string());
                }
                _ => {}
            }
        }
        StoreError::Database(e)
    }
}

// SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_BUSY_SNAPSHOT (517): another
// writer holds the database and the statement can be retried.
fn is_unavailable(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6") | Some("517"))
        }
        _ => false,
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.kind() == ErrorKind::UniqueViolation)
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.kind() == ErrorKind::ForeignKeyViolation)
}
