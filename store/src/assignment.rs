use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::{Row, SqliteConnection, SqlitePool};
use types::{
    CorrectAnswer, CorrectAnswerId, Game, GameId, GameMark, GameMarkId, GameTask, GameTaskId,
    MarkId, TaskId,
};

use crate::error::{is_foreign_key_violation, is_unique_violation, StoreError};
use crate::games;

/// Store for per-game assignments and answer pairings. All mutations are
/// gated on the game being open and run in a single transaction.
pub struct AssignmentStore {
    pool: SqlitePool,
}

impl AssignmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn assign_mark(
        &self,
        game_id: GameId,
        mark_id: MarkId,
        now: DateTime<Utc>,
    ) -> Result<GameMark, StoreError> {
        let mut tx = self.pool.begin().await?;
        require_open_game(&mut tx, game_id, now).await?;
        let result = sqlx::query("INSERT INTO game_marks (game_id, mark_id) VALUES (?, ?)")
            .bind(game_id.as_i64())
            .bind(mark_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                classify_assignment(
                    e,
                    format!("mark {mark_id} is already assigned to game {game_id}"),
                    format!("mark {mark_id}"),
                )
            })?;
        tx.commit().await?;
        Ok(GameMark {
            id: GameMarkId::new(result.last_insert_rowid()),
            game_id,
            mark_id,
        })
    }

    /// Assigns a catalog task to a game, snapshotting the task's current
    /// reward. Later edits to the catalog row never change what this game
    /// pays out.
    pub async fn assign_task(
        &self,
        game_id: GameId,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<GameTask, StoreError> {
        let mut tx = self.pool.begin().await?;
        require_open_game(&mut tx, game_id, now).await?;
        let task_row = sqlx::query("SELECT reward FROM tasks WHERE id = ?")
            .bind(task_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;
        let reward: i64 = match task_row {
            Some(row) => row.get("reward"),
            None => return Err(StoreError::UnknownEntity(format!("task {task_id}"))),
        };
        let result = sqlx::query("INSERT INTO game_tasks (game_id, task_id, reward) VALUES (?, ?, ?)")
            .bind(game_id.as_i64())
            .bind(task_id.as_i64())
            .bind(reward)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                classify_assignment(
                    e,
                    format!("task {task_id} is already assigned to game {game_id}"),
                    format!("task {task_id}"),
                )
            })?;
        tx.commit().await?;
        Ok(GameTask {
            id: GameTaskId::new(result.last_insert_rowid()),
            game_id,
            task_id,
            reward,
        })
    }

    /// Pairs a game task with the game mark that answers it. Each task
    /// takes at most one answer and each mark answers at most one task
    /// within a game; both sides must belong to `game_id`.
    pub async fn set_correct_answer(
        &self,
        game_id: GameId,
        game_task_id: GameTaskId,
        game_mark_id: GameMarkId,
        now: DateTime<Utc>,
    ) -> Result<CorrectAnswer, StoreError> {
        let mut tx = self.pool.begin().await?;
        require_open_game(&mut tx, game_id, now).await?;

        match fetch_game_task(&mut tx, game_task_id).await? {
            Some(task) if task.game_id == game_id => {}
            Some(task) => {
                return Err(StoreError::CrossGameReference(format!(
                    "game task {game_task_id} belongs to game {}, not game {game_id}",
                    task.game_id
                )))
            }
            None => {
                return Err(StoreError::UnknownAssignment(format!(
                    "game task {game_task_id}"
                )))
            }
        }
        match fetch_game_mark(&mut tx, game_mark_id).await? {
            Some(mark) if mark.game_id == game_id => {}
            Some(mark) => {
                return Err(StoreError::CrossGameReference(format!(
                    "game mark {game_mark_id} belongs to game {}, not game {game_id}",
                    mark.game_id
                )))
            }
            None => {
                return Err(StoreError::UnknownAssignment(format!(
                    "game mark {game_mark_id}"
                )))
            }
        }

        if fetch_answer(&mut tx, game_task_id).await?.is_some() {
            return Err(StoreError::TaskAlreadyAnswered(game_task_id));
        }
        if mark_already_used(&mut tx, game_id, game_mark_id).await? {
            return Err(StoreError::MarkAlreadyUsed(game_mark_id));
        }

        let result = sqlx::query(
            "INSERT INTO correct_answers (game_id, game_task_id, game_mark_id) VALUES (?, ?, ?)",
        )
        .bind(game_id.as_i64())
        .bind(game_task_id.as_i64())
        .bind(game_mark_id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_answer_conflict(e, game_task_id, game_mark_id))?;
        tx.commit().await?;
        Ok(CorrectAnswer {
            id: CorrectAnswerId::new(result.last_insert_rowid()),
            game_id,
            game_task_id,
            game_mark_id,
        })
    }

    /// The configured answer for a task, if any. Reads committed state only.
    pub async fn answer_for(
        &self,
        game_task_id: GameTaskId,
    ) -> Result<Option<GameMarkId>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_answer(&mut conn, game_task_id).await
    }

    pub async fn game_task(&self, id: GameTaskId) -> Result<Option<GameTask>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_game_task(&mut conn, id).await
    }

    pub async fn game_mark(&self, id: GameMarkId) -> Result<Option<GameMark>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_game_mark(&mut conn, id).await
    }

    pub async fn tasks_for_game(&self, game_id: GameId) -> Result<Vec<GameTask>, StoreError> {
        let rows =
            sqlx::query("SELECT id, game_id, task_id, reward FROM game_tasks WHERE game_id = ? ORDER BY id")
                .bind(game_id.as_i64())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| GameTask {
                id: GameTaskId::new(r.get("id")),
                game_id: GameId::new(r.get("game_id")),
                task_id: TaskId::new(r.get("task_id")),
                reward: r.get("reward"),
            })
            .collect())
    }

    pub async fn marks_for_game(&self, game_id: GameId) -> Result<Vec<GameMark>, StoreError> {
        let rows =
            sqlx::query("SELECT id, game_id, mark_id FROM game_marks WHERE game_id = ? ORDER BY id")
                .bind(game_id.as_i64())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| GameMark {
                id: GameMarkId::new(r.get("id")),
                game_id: GameId::new(r.get("game_id")),
                mark_id: MarkId::new(r.get("mark_id")),
            })
            .collect())
    }
}

async fn require_open_game(
    conn: &mut SqliteConnection,
    game_id: GameId,
    now: DateTime<Utc>,
) -> Result<Game, StoreError> {
    let game = games::fetch_game(conn, game_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("game {game_id}")))?;
    if !game.is_open(now) {
        return Err(StoreError::GameClosed(game_id));
    }
    Ok(game)
}

pub(crate) async fn fetch_game_task(
    conn: &mut SqliteConnection,
    id: GameTaskId,
) -> Result<Option<GameTask>, StoreError> {
    let row = sqlx::query("SELECT id, game_id, task_id, reward FROM game_tasks WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| GameTask {
        id: GameTaskId::new(r.get("id")),
        game_id: GameId::new(r.get("game_id")),
        task_id: TaskId::new(r.get("task_id")),
        reward: r.get("reward"),
    }))
}

pub(crate) async fn fetch_game_mark(
    conn: &mut SqliteConnection,
    id: GameMarkId,
) -> Result<Option<GameMark>, StoreError> {
    let row = sqlx::query("SELECT id, game_id, mark_id FROM game_marks WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| GameMark {
        id: GameMarkId::new(r.get("id")),
        game_id: GameId::new(r.get("game_id")),
        mark_id: MarkId::new(r.get("mark_id")),
    }))
}

async fn fetch_answer(
    conn: &mut SqliteConnection,
    game_task_id: GameTaskId,
) -> Result<Option<GameMarkId>, StoreError> {
    let row = sqlx::query("SELECT game_mark_id FROM correct_answers WHERE game_task_id = ?")
        .bind(game_task_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| GameMarkId::new(r.get("game_mark_id"))))
}

async fn mark_already_used(
    conn: &mut SqliteConnection,
    game_id: GameId,
    game_mark_id: GameMarkId,
) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT id FROM correct_answers WHERE game_id = ? AND game_mark_id = ?")
        .bind(game_id.as_i64())
        .bind(game_mark_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

fn classify_assignment(e: sqlx::Error, duplicate: String, missing: String) -> StoreError {
    if is_unique_violation(&e) {
        return StoreError::DuplicateAssignment(duplicate);
    }
    if is_foreign_key_violation(&e) {
        return StoreError::UnknownEntity(missing);
    }
    StoreError::from(e)
}

// The pre-checks make these violations rare; they can still fire when two
// writers race on the same pairing.
fn classify_answer_conflict(
    e: sqlx::Error,
    game_task_id: GameTaskId,
    game_mark_id: GameMarkId,
) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.kind() {
            ErrorKind::UniqueViolation => {
                let message = db.message();
                if message.contains("game_task_id") {
                    return StoreError::TaskAlreadyAnswered(game_task_id);
                }
                if message.contains("game_mark_id") {
                    return StoreError::MarkAlreadyUsed(game_mark_id);
                }
            }
            ErrorKind::ForeignKeyViolation => {
                return StoreError::CrossGameReference(format!(
                    "game task {game_task_id} or game mark {game_mark_id} is not part of the game"
                ))
            }
            _ => {}
        }
    }
    StoreError::from(e)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::catalog::CatalogStore;
    use crate::games::GameStore;
    use crate::test_support::memory_pool;

    struct Fixture {
        pool: SqlitePool,
        catalog: CatalogStore,
        games: GameStore,
        assignments: AssignmentStore,
        now: DateTime<Utc>,
    }

    async fn fixture() -> Fixture {
        let pool = memory_pool().await;
        Fixture {
            catalog: CatalogStore::new(pool.clone()),
            games: GameStore::new(pool.clone()),
            assignments: AssignmentStore::new(pool.clone()),
            pool,
            now: Utc::now(),
        }
    }

    impl Fixture {
        async fn open_game(&self) -> Game {
            self.games
                .create(self.now - Duration::hours(1), None, None)
                .await
                .expect("failed to create game")
        }

        async fn mark(&self, longitude: f64) -> MarkId {
            self.catalog
                .add_mark(longitude, 56.95, None)
                .await
                .expect("failed to add mark")
                .id
        }

        async fn task(&self, description: &str, reward: i64) -> TaskId {
            self.catalog
                .add_task(description, Some(reward))
                .await
                .expect("failed to add task")
                .id
        }
    }

    #[tokio::test]
    async fn test_assign_mark_to_open_game() {
        let f = fixture().await;
        let game = f.open_game().await;
        let mark_id = f.mark(24.10).await;

        let game_mark = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        assert_eq!(game_mark.game_id, game.id);
        assert_eq!(game_mark.mark_id, mark_id);

        let listed = f
            .assignments
            .marks_for_game(game.id)
            .await
            .expect("failed to list game marks");
        assert_eq!(listed, vec![game_mark]);
    }

    #[tokio::test]
    async fn test_same_mark_twice_is_a_duplicate() {
        let f = fixture().await;
        let game = f.open_game().await;
        let mark_id = f.mark(24.10).await;

        f.assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        let err = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAssignment(_)));
    }

    #[tokio::test]
    async fn test_same_mark_in_two_games_is_fine() {
        let f = fixture().await;
        let first = f.open_game().await;
        let second = f.open_game().await;
        let mark_id = f.mark(24.10).await;

        let a = f
            .assignments
            .assign_mark(first.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        let b = f
            .assignments
            .assign_mark(second.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_unknown_mark_is_rejected() {
        let f = fixture().await;
        let game = f.open_game().await;

        let err = f
            .assignments
            .assign_mark(game.id, MarkId::new(404), f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownEntity(_)));
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let f = fixture().await;
        let mark_id = f.mark(24.10).await;

        let err = f
            .assignments
            .assign_mark(GameId::new(404), mark_id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_closed_game_rejects_assignment() {
        let f = fixture().await;
        let game = f
            .games
            .create(f.now - Duration::hours(2), Some(f.now - Duration::hours(1)), None)
            .await
            .expect("failed to create game");
        let mark_id = f.mark(24.10).await;

        let err = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::GameClosed(_)));
    }

    #[tokio::test]
    async fn test_not_yet_open_game_rejects_assignment() {
        let f = fixture().await;
        let game = f
            .games
            .create(f.now + Duration::hours(1), None, None)
            .await
            .expect("failed to create game");
        let mark_id = f.mark(24.10).await;

        let err = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::GameClosed(_)));
    }

    #[tokio::test]
    async fn test_assign_task_snapshots_reward() {
        let f = fixture().await;
        let game = f.open_game().await;
        let task_id = f.task("Count the statues", 150).await;

        let game_task = f
            .assignments
            .assign_task(game.id, task_id, f.now)
            .await
            .expect("failed to assign task");
        assert_eq!(game_task.reward, 150);

        // Drift the catalog row; the snapshot must not move.
        sqlx::query("UPDATE tasks SET reward = 999 WHERE id = ?")
            .bind(task_id.as_i64())
            .execute(&f.pool)
            .await
            .expect("failed to update task");
        let stored = f
            .assignments
            .game_task(game_task.id)
            .await
            .expect("failed to fetch game task")
            .expect("game task should exist");
        assert_eq!(stored.reward, 150);
    }

    #[tokio::test]
    async fn test_unknown_task_is_rejected() {
        let f = fixture().await;
        let game = f.open_game().await;

        let err = f
            .assignments
            .assign_task(game.id, TaskId::new(404), f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownEntity(_)));
    }

    #[tokio::test]
    async fn test_set_and_read_correct_answer() {
        let f = fixture().await;
        let game = f.open_game().await;
        let mark_id = f.mark(24.10).await;
        let task_id = f.task("Find the plaque", 100).await;

        let game_mark = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        let game_task = f
            .assignments
            .assign_task(game.id, task_id, f.now)
            .await
            .expect("failed to assign task");

        let answer = f
            .assignments
            .set_correct_answer(game.id, game_task.id, game_mark.id, f.now)
            .await
            .expect("failed to set correct answer");
        assert_eq!(answer.game_mark_id, game_mark.id);

        let found = f
            .assignments
            .answer_for(game_task.id)
            .await
            .expect("failed to read answer");
        assert_eq!(found, Some(game_mark.id));
    }

    #[tokio::test]
    async fn test_unanswered_task_has_no_answer() {
        let f = fixture().await;
        let game = f.open_game().await;
        let task_id = f.task("Find the plaque", 100).await;
        let game_task = f
            .assignments
            .assign_task(game.id, task_id, f.now)
            .await
            .expect("failed to assign task");

        let found = f
            .assignments
            .answer_for(game_task.id)
            .await
            .expect("failed to read answer");
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_second_answer_for_task_is_rejected() {
        let f = fixture().await;
        let game = f.open_game().await;
        let first_mark = f.mark(24.10).await;
        let second_mark = f.mark(24.20).await;
        let task_id = f.task("Find the plaque", 100).await;

        let gm1 = f
            .assignments
            .assign_mark(game.id, first_mark, f.now)
            .await
            .expect("failed to assign mark");
        let gm2 = f
            .assignments
            .assign_mark(game.id, second_mark, f.now)
            .await
            .expect("failed to assign mark");
        let gt = f
            .assignments
            .assign_task(game.id, task_id, f.now)
            .await
            .expect("failed to assign task");

        f.assignments
            .set_correct_answer(game.id, gt.id, gm1.id, f.now)
            .await
            .expect("failed to set correct answer");
        let err = f
            .assignments
            .set_correct_answer(game.id, gt.id, gm2.id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TaskAlreadyAnswered(_)));
    }

    #[tokio::test]
    async fn test_mark_cannot_answer_two_tasks() {
        let f = fixture().await;
        let game = f.open_game().await;
        let mark_id = f.mark(24.10).await;
        let first_task = f.task("First task", 100).await;
        let second_task = f.task("Second task", 100).await;

        let gm = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        let gt1 = f
            .assignments
            .assign_task(game.id, first_task, f.now)
            .await
            .expect("failed to assign task");
        let gt2 = f
            .assignments
            .assign_task(game.id, second_task, f.now)
            .await
            .expect("failed to assign task");

        f.assignments
            .set_correct_answer(game.id, gt1.id, gm.id, f.now)
            .await
            .expect("failed to set correct answer");
        let err = f
            .assignments
            .set_correct_answer(game.id, gt2.id, gm.id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MarkAlreadyUsed(_)));
    }

    #[tokio::test]
    async fn test_answer_must_stay_within_one_game() {
        let f = fixture().await;
        let first = f.open_game().await;
        let second = f.open_game().await;
        let mark_id = f.mark(24.10).await;
        let task_id = f.task("Find the plaque", 100).await;

        let foreign_mark = f
            .assignments
            .assign_mark(second.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        let gt = f
            .assignments
            .assign_task(first.id, task_id, f.now)
            .await
            .expect("failed to assign task");

        let err = f
            .assignments
            .set_correct_answer(first.id, gt.id, foreign_mark.id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CrossGameReference(_)));

        // Symmetric direction: the task is the foreign assignment.
        let native_mark = f
            .assignments
            .assign_mark(first.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        let foreign_task = f
            .assignments
            .assign_task(second.id, task_id, f.now)
            .await
            .expect("failed to assign task");
        let err = f
            .assignments
            .set_correct_answer(first.id, foreign_task.id, native_mark.id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CrossGameReference(_)));
    }

    #[tokio::test]
    async fn test_answer_with_unknown_assignment_is_rejected() {
        let f = fixture().await;
        let game = f.open_game().await;
        let mark_id = f.mark(24.10).await;
        let gm = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");

        let err = f
            .assignments
            .set_correct_answer(game.id, GameTaskId::new(404), gm.id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownAssignment(_)));
    }

    #[tokio::test]
    async fn test_closed_game_rejects_answer_pairing() {
        let f = fixture().await;
        let game = f.open_game().await;
        let mark_id = f.mark(24.10).await;
        let task_id = f.task("Find the plaque", 100).await;
        let gm = f
            .assignments
            .assign_mark(game.id, mark_id, f.now)
            .await
            .expect("failed to assign mark");
        let gt = f
            .assignments
            .assign_task(game.id, task_id, f.now)
            .await
            .expect("failed to assign task");

        f.games
            .close(game.id, f.now - Duration::minutes(1))
            .await
            .expect("failed to close game");
        let err = f
            .assignments
            .set_correct_answer(game.id, gt.id, gm.id, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::GameClosed(_)));
    }
}
