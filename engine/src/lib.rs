pub mod clock;
pub mod verify;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use store::{
    AssignmentStore, CatalogStore, GameStore, ProgressStore, SqliteSubmissionLog, StoreError,
    SubmissionLog, SubmissionStore,
};
use types::{
    CorrectAnswer, Game, GameId, GameMark, GameMarkId, GameTask, GameTaskId, LeaderboardEntry,
    MarkId, RegionId, SubmissionAttempt, SubmissionOutcome, TaskId, TeamId, TeamProgress,
};

use crate::clock::{Clock, SystemClock};

pub use crate::clock::ManualClock;

/// Facade over the stores that stamps every operation with the engine
/// clock and runs the submission flow: verify against the configured
/// answer, append to the attempt log, then claim the score.
pub struct GameEngine {
    pool: SqlitePool,
    catalog: CatalogStore,
    games: GameStore,
    assignments: AssignmentStore,
    submissions: SubmissionStore,
    progress: ProgressStore,
    submission_log: Box<dyn SubmissionLog>,
    clock: Box<dyn Clock>,
}

impl GameEngine {
    pub fn new(pool: SqlitePool) -> Self {
        let log = SqliteSubmissionLog::new(pool.clone());
        Self::build(pool, Box::new(log), Box::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Box<dyn Clock>) -> Self {
        let log = SqliteSubmissionLog::new(pool.clone());
        Self::build(pool, Box::new(log), clock)
    }

    pub fn with_submission_log(pool: SqlitePool, submission_log: Box<dyn SubmissionLog>) -> Self {
        Self::build(pool, submission_log, Box::new(SystemClock))
    }

    fn build(
        pool: SqlitePool,
        submission_log: Box<dyn SubmissionLog>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            catalog: CatalogStore::new(pool.clone()),
            games: GameStore::new(pool.clone()),
            assignments: AssignmentStore::new(pool.clone()),
            submissions: SubmissionStore::new(pool.clone()),
            progress: ProgressStore::new(pool.clone()),
            submission_log,
            clock,
            pool,
        }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        store::run_migrations(&self.pool).await
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_game(
        &self,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        region_id: Option<RegionId>,
    ) -> Result<Game, StoreError> {
        let game = self.games.create(start_time, end_time, region_id).await?;
        tracing::info!("Created game {} starting {}", game.id, game.start_time);
        Ok(game)
    }

    /// Closes a game as of the engine clock's current time.
    pub async fn close_game(&self, id: GameId) -> Result<Game, StoreError> {
        self.close_game_at(id, self.clock.now()).await
    }

    pub async fn close_game_at(&self, id: GameId, end_time: DateTime<Utc>) -> Result<Game, StoreError> {
        let game = self.games.close(id, end_time).await?;
        tracing::info!("Closed game {} at {end_time}", game.id);
        Ok(game)
    }

    pub async fn find_game(&self, id: GameId) -> Result<Game, StoreError> {
        self.games.find(id).await
    }

    pub async fn list_games(&self) -> Result<Vec<Game>, StoreError> {
        self.games.list().await
    }

    /// Whether the game's window contains the engine clock's current time.
    pub async fn is_open(&self, game_id: GameId) -> Result<bool, StoreError> {
        let game = self.games.find(game_id).await?;
        Ok(game.is_open(self.clock.now()))
    }

    pub async fn assign_mark(&self, game_id: GameId, mark_id: MarkId) -> Result<GameMark, StoreError> {
        self.assignments
            .assign_mark(game_id, mark_id, self.clock.now())
            .await
    }

    pub async fn assign_task(&self, game_id: GameId, task_id: TaskId) -> Result<GameTask, StoreError> {
        self.assignments
            .assign_task(game_id, task_id, self.clock.now())
            .await
    }

    pub async fn set_correct_answer(
        &self,
        game_id: GameId,
        game_task_id: GameTaskId,
        game_mark_id: GameMarkId,
    ) -> Result<CorrectAnswer, StoreError> {
        self.assignments
            .set_correct_answer(game_id, game_task_id, game_mark_id, self.clock.now())
            .await
    }

    pub async fn answer_for(&self, game_task_id: GameTaskId) -> Result<Option<GameMarkId>, StoreError> {
        self.assignments.answer_for(game_task_id).await
    }

    pub async fn tasks_for_game(&self, game_id: GameId) -> Result<Vec<GameTask>, StoreError> {
        self.assignments.tasks_for_game(game_id).await
    }

    pub async fn marks_for_game(&self, game_id: GameId) -> Result<Vec<GameMark>, StoreError> {
        self.assignments.marks_for_game(game_id).await
    }

    /// Verifies a team's answer to a task and scores it if it is the
    /// team's first correct one. Every judged attempt lands in the log,
    /// whatever its outcome; rejected submissions (closed game, unknown
    /// ids) leave no trace.
    pub async fn submit_answer(
        &self,
        team_id: TeamId,
        game_id: GameId,
        game_task_id: GameTaskId,
        game_mark_id: GameMarkId,
    ) -> Result<SubmissionOutcome, StoreError> {
        let now = self.clock.now();

        let game = self.games.find(game_id).await?;
        if !game.is_open(now) {
            return Err(StoreError::GameClosed(game_id));
        }
        let game_task = self
            .assignments
            .game_task(game_task_id)
            .await?
            .filter(|task| task.game_id == game_id)
            .ok_or_else(|| {
                StoreError::UnknownAssignment(format!(
                    "game task {game_task_id} in game {game_id}"
                ))
            })?;
        self.catalog.find_team(team_id).await?;
        let submitted = self
            .assignments
            .game_mark(game_mark_id)
            .await?
            .ok_or_else(|| StoreError::UnknownAssignment(format!("game mark {game_mark_id}")))?;

        // A mark from another game can never be the configured answer, so it
        // is judged like any other wrong mark rather than rejected.
        let expected = self.assignments.answer_for(game_task_id).await?;
        let correct = verify::is_correct(submitted.id, expected);

        let attempt = SubmissionAttempt {
            id: None,
            team_id,
            game_task_id,
            submitted_game_mark_id: submitted.id,
            is_correct: correct,
            submitted_at: now,
        };
        let attempt_id = self.submission_log.append(&attempt).await?;

        if !correct {
            tracing::info!("Team {team_id} answered game task {game_task_id} incorrectly");
            return Ok(SubmissionOutcome::incorrect());
        }

        let accepted = self
            .submissions
            .record_correct(team_id, &game_task, attempt_id, now)
            .await?;
        tracing::info!(
            "Team {team_id} answered game task {game_task_id} correctly (accepted: {accepted})"
        );
        Ok(SubmissionOutcome::correct(accepted))
    }

    pub async fn attempts_for(
        &self,
        team_id: TeamId,
        game_task_id: GameTaskId,
    ) -> Result<Vec<SubmissionAttempt>, StoreError> {
        self.submission_log.attempts_for(team_id, game_task_id).await
    }

    /// Explicitly marks a team's run complete, independent of solved tasks.
    pub async fn mark_complete(&self, team_id: TeamId, game_id: GameId) -> Result<(), StoreError> {
        self.catalog.find_team(team_id).await?;
        self.games.find(game_id).await?;
        self.progress
            .mark_complete(team_id, game_id, self.clock.now())
            .await
    }

    pub async fn progress_for(
        &self,
        team_id: TeamId,
        game_id: GameId,
    ) -> Result<Option<TeamProgress>, StoreError> {
        self.progress.progress_for(team_id, game_id).await
    }

    pub async fn leaderboard(&self, game_id: GameId) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.progress.leaderboard(game_id).await
    }
}
