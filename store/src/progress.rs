use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use types::{GameId, LeaderboardEntry, TeamId, TeamProgress};

use crate::error::StoreError;
use crate::games;

/// Store for per-team scoring state and standings. Awards only flow in
/// through accepted submission claims, so score mutation stays crate-private.
pub struct ProgressStore {
    pool: SqlitePool,
}

impl ProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Marks a team's run through a game complete. Idempotent: the first
    /// completion time wins and later calls leave it unchanged.
    pub async fn mark_complete(
        &self,
        team_id: TeamId,
        game_id: GameId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        ensure_row(&mut tx, team_id, game_id).await?;
        set_completed(&mut tx, team_id, game_id, now).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn progress_for(
        &self,
        team_id: TeamId,
        game_id: GameId,
    ) -> Result<Option<TeamProgress>, StoreError> {
        let row = sqlx::query(
            "SELECT score, completed_at FROM team_game_progress WHERE team_id = ? AND game_id = ?",
        )
        .bind(team_id.to_string())
        .bind(game_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| TeamProgress {
            team_id,
            game_id,
            score: r.get("score"),
            completed_at: r.get("completed_at"),
        }))
    }

    /// Standings for one game: highest score first, then completed teams
    /// ahead of uncompleted ones, then earlier completion, then team id.
    pub async fn leaderboard(&self, game_id: GameId) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if games::fetch_game(&mut conn, game_id).await?.is_none() {
            return Err(StoreError::NotFound(format!("game {game_id}")));
        }
        let rows = sqlx::query(
            "SELECT team_id, score, completed_at FROM team_game_progress \
             WHERE game_id = ? \
             ORDER BY score DESC, completed_at IS NULL ASC, completed_at ASC, team_id ASC",
        )
        .bind(game_id.as_i64())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter()
            .map(|r| {
                let team: String = r.get("team_id");
                Ok(LeaderboardEntry {
                    team_id: TeamId::parse(&team)?,
                    score: r.get("score"),
                    completed_at: r.get("completed_at"),
                })
            })
            .collect()
    }
}

pub(crate) async fn ensure_row(
    conn: &mut SqliteConnection,
    team_id: TeamId,
    game_id: GameId,
) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO team_game_progress (team_id, game_id, score) VALUES (?, ?, 0)")
        .bind(team_id.to_string())
        .bind(game_id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn apply_award(
    conn: &mut SqliteConnection,
    team_id: TeamId,
    game_id: GameId,
    reward: i64,
) -> Result<(), StoreError> {
    ensure_row(conn, team_id, game_id).await?;
    sqlx::query("UPDATE team_game_progress SET score = score + ? WHERE team_id = ? AND game_id = ?")
        .bind(reward)
        .bind(team_id.to_string())
        .bind(game_id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Sets the completion time if it is not set yet. Returns whether this call
/// was the one that set it.
pub(crate) async fn set_completed(
    conn: &mut SqliteConnection,
    team_id: TeamId,
    game_id: GameId,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE team_game_progress SET completed_at = ? \
         WHERE team_id = ? AND game_id = ? AND completed_at IS NULL",
    )
    .bind(now)
    .bind(team_id.to_string())
    .bind(game_id.as_i64())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
