use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use types::{AttemptId, GameId, GameMarkId, GameTask, GameTaskId, SubmissionAttempt, TeamId};

use crate::error::StoreError;
use crate::progress;

/// Append-only history of answer submissions. The log is pluggable so the
/// engine can run without persisting attempts.
#[async_trait::async_trait]
pub trait SubmissionLog: Send + Sync {
    /// Appends one attempt. Returns the stored attempt id, or `None` when
    /// the log does not persist anything.
    async fn append(&self, attempt: &SubmissionAttempt) -> Result<Option<AttemptId>, StoreError>;

    /// All attempts a team has made on a task, oldest first.
    async fn attempts_for(
        &self,
        team_id: TeamId,
        game_task_id: GameTaskId,
    ) -> Result<Vec<SubmissionAttempt>, StoreError>;
}

pub struct SqliteSubmissionLog {
    pool: SqlitePool,
}

impl SqliteSubmissionLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubmissionLog for SqliteSubmissionLog {
    async fn append(&self, attempt: &SubmissionAttempt) -> Result<Option<AttemptId>, StoreError> {
        let result = sqlx::query(
            "INSERT INTO submission_attempts (team_id, game_task_id, submitted_game_mark_id, is_correct, submitted_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(attempt.team_id.to_string())
        .bind(attempt.game_task_id.as_i64())
        .bind(attempt.submitted_game_mark_id.as_i64())
        .bind(attempt.is_correct)
        .bind(attempt.submitted_at)
        .execute(&self.pool)
        .await?;
        Ok(Some(AttemptId::new(result.last_insert_rowid())))
    }

    async fn attempts_for(
        &self,
        team_id: TeamId,
        game_task_id: GameTaskId,
    ) -> Result<Vec<SubmissionAttempt>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, team_id, game_task_id, submitted_game_mark_id, is_correct, submitted_at \
             FROM submission_attempts WHERE team_id = ? AND game_task_id = ? ORDER BY id",
        )
        .bind(team_id.to_string())
        .bind(game_task_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let team: String = r.get("team_id");
                Ok(SubmissionAttempt {
                    id: Some(AttemptId::new(r.get("id"))),
                    team_id: TeamId::parse(&team)?,
                    game_task_id: GameTaskId::new(r.get("game_task_id")),
                    submitted_game_mark_id: GameMarkId::new(r.get("submitted_game_mark_id")),
                    is_correct: r.get("is_correct"),
                    submitted_at: r.get("submitted_at"),
                })
            })
            .collect()
    }
}

/// Store that turns a correct answer into score, exactly once per team and
/// task.
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Claims a correct answer for a team. The first claim per team/task
    /// pair awards the task's reward, updates completion, and returns
    /// `true`; every later claim is a no-op returning `false`.
    pub async fn record_correct(
        &self,
        team_id: TeamId,
        game_task: &GameTask,
        attempt_id: Option<AttemptId>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let claim = sqlx::query(
            "INSERT OR IGNORE INTO solved_tasks (team_id, game_task_id, attempt_id, solved_at) VALUES (?, ?, ?, ?)",
        )
        .bind(team_id.to_string())
        .bind(game_task.id.as_i64())
        .bind(attempt_id.map(AttemptId::as_i64))
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if claim.rows_affected() == 0 {
            // Another submission already claimed this task for the team.
            return Ok(false);
        }

        progress::apply_award(&mut tx, team_id, game_task.game_id, game_task.reward).await?;

        if all_tasks_solved(&mut tx, team_id, game_task.game_id).await? {
            progress::set_completed(&mut tx, team_id, game_task.game_id, now).await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

async fn all_tasks_solved(
    conn: &mut SqliteConnection,
    team_id: TeamId,
    game_id: GameId,
) -> Result<bool, StoreError> {
    let row = sqlx::query(
        "SELECT \
           (SELECT COUNT(*) FROM game_tasks WHERE game_id = ?) AS total, \
           (SELECT COUNT(*) FROM solved_tasks st \
              JOIN game_tasks gt ON gt.id = st.game_task_id \
              WHERE st.team_id = ? AND gt.game_id = ?) AS solved",
    )
    .bind(game_id.as_i64())
    .bind(team_id.to_string())
    .bind(game_id.as_i64())
    .fetch_one(&mut *conn)
    .await?;
    let total: i64 = row.get("total");
    let solved: i64 = row.get("solved");
    Ok(total > 0 && solved >= total)
}
