use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AttemptId, GameMarkId, GameTaskId, TeamId};

/// One answer submission, correct or not. Attempts are append-only history;
/// `id` is `None` until the attempt has been written to the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    pub id: Option<AttemptId>,
    pub team_id: TeamId,
    pub game_task_id: GameTaskId,
    pub submitted_game_mark_id: GameMarkId,
    pub is_correct: bool,
    pub submitted_at: DateTime<Utc>,
}

/// What a submission did. `correct` says whether the mark matched the
/// configured answer; `accepted` says whether this submission was the one
/// that scored (first correct submission for the team/task pair).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub correct: bool,
    pub accepted: bool,
}

impl SubmissionOutcome {
    pub fn incorrect() -> Self {
        Self {
            correct: false,
            accepted: false,
        }
    }

    pub fn correct(accepted: bool) -> Self {
        Self {
            correct: true,
            accepted,
        }
    }
}
