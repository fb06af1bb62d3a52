pub mod assignment;
pub mod catalog;
pub mod game;
pub mod id;
pub mod progress;
pub mod submission;

pub use assignment::{CorrectAnswer, GameMark, GameTask};
pub use catalog::{Mark, Task, Team, DEFAULT_TASK_REWARD};
pub use game::Game;
pub use id::{
    AttemptId, CorrectAnswerId, GameId, GameMarkId, GameTaskId, MarkId, RegionId, TaskId, TeamId,
};
pub use progress::{LeaderboardEntry, TeamProgress};
pub use submission::{SubmissionAttempt, SubmissionOutcome};
