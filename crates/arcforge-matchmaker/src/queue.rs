//! The `queueentry/{queueId}/{entryId}` key family (spec.md §3, §6).
//!
//! A `QueueEntry` is ordered by creation time within its queue — entries
//! are listed by key, and `EntryId`s come from `IdGenerator`, so
//! lexicographic key order already is creation order.

use arcforge_protocol::{EntryId, Player, UserId};
use serde::{Deserialize, Serialize};

/// One waiting entry in a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "L: Serialize", deserialize = "L: Deserialize<'de>"))]
pub struct QueueEntry<L> {
    pub entry_id: EntryId,
    pub created_at_ms: u64,
    pub user_id: UserId,
    pub player: Player,
    pub loadout: L,
}
