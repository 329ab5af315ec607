//! The `assignments/{entryId}` key family (spec.md §3, §6).
//!
//! Written exactly once when a queue entry or room member is promoted
//! into a game; watched by the owning lobby connection to deliver
//! "your game is ready".

use arcforge_protocol::GameId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub game_id: GameId,
}
