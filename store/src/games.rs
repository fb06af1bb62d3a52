use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use types::{Game, GameId, RegionId};

use crate::error::StoreError;

/// Store for game lifecycle: creation, lookup, and closing. Whether a game
/// is open is derived from its window via [`Game::is_open`], never stored.
pub struct GameStore {
    pool: SqlitePool,
}

impl GameStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        region_id: Option<RegionId>,
    ) -> Result<Game, StoreError> {
        if let Some(end) = end_time {
            if end <= start_time {
                return Err(StoreError::InvalidWindow(format!(
                    "end time {end} is not after start time {start_time}"
                )));
            }
        }
        let result = sqlx::query("INSERT INTO games (start_time, end_time, region_id) VALUES (?, ?, ?)")
            .bind(start_time)
            .bind(end_time)
            .bind(region_id.map(RegionId::as_i64))
            .execute(&self.pool)
            .await?;
        Ok(Game {
            id: GameId::new(result.last_insert_rowid()),
            start_time,
            end_time,
            region_id,
        })
    }

    /// Sets (or moves) the end time of a game. Closing an already-closed
    /// game overwrites its end time; the new window must still be valid.
    pub async fn close(&self, id: GameId, end_time: DateTime<Utc>) -> Result<Game, StoreError> {
        let game = self.find(id).await?;
        if end_time <= game.start_time {
            return Err(StoreError::InvalidWindow(format!(
                "end time {end_time} is not after start time {}",
                game.start_time
            )));
        }
        sqlx::query("UPDATE games SET end_time = ? WHERE id = ?")
            .bind(end_time)
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(Game {
            end_time: Some(end_time),
            ..game
        })
    }

    pub async fn find(&self, id: GameId) -> Result<Game, StoreError> {
        let mut conn = self.pool.acquire().await?;
        match fetch_game(&mut conn, id).await? {
            Some(game) => Ok(game),
            None => Err(StoreError::NotFound(format!("game {id}"))),
        }
    }

    /// All games, most recent start first.
    pub async fn list(&self) -> Result<Vec<Game>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, start_time, end_time, region_id FROM games ORDER BY start_time DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(game_from_row).collect())
    }
}

pub(crate) async fn fetch_game(
    conn: &mut SqliteConnection,
    id: GameId,
) -> Result<Option<Game>, StoreError> {
    let row = sqlx::query("SELECT id, start_time, end_time, region_id FROM games WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(game_from_row))
}

pub(crate) fn game_from_row(row: &SqliteRow) -> Game {
    Game {
        id: GameId::new(row.get("id")),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        region_id: row.get::<Option<i64>, _>("region_id").map(RegionId::new),
    }
}
