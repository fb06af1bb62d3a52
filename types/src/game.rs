use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{GameId, RegionId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub region_id: Option<RegionId>,
}

impl Game {
    /// A game is open from its start time (inclusive) until its end time
    /// (exclusive). A game without an end time stays open indefinitely.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if now < self.start_time {
            return false;
        }
        match self.end_time {
            Some(end) => now < end,
            None => true,
        }
    }
}
