use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{GameId, TeamId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamProgress {
    pub team_id: TeamId,
    pub game_id: GameId,
    pub score: i64,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub team_id: TeamId,
    pub score: i64,
    pub completed_at: Option<DateTime<Utc>>,
}
