use serde::{Deserialize, Serialize};

use crate::id::{CorrectAnswerId, GameId, GameMarkId, GameTaskId, MarkId, TaskId};

/// A catalog mark assigned to a game. Answers and correct-answer pairings
/// always refer to this id, never to the catalog [`MarkId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMark {
    pub id: GameMarkId,
    pub game_id: GameId,
    pub mark_id: MarkId,
}

/// A catalog task assigned to a game. `reward` is a snapshot taken at
/// assignment time, so later edits to the catalog task never change the
/// points this game pays out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTask {
    pub id: GameTaskId,
    pub game_id: GameId,
    pub task_id: TaskId,
    pub reward: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectAnswer {
    pub id: CorrectAnswerId,
    pub game_id: GameId,
    pub game_task_id: GameTaskId,
    pub game_mark_id: GameMarkId,
}
