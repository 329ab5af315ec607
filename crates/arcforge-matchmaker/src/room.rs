//! The `rooms/{roomId}` key family (spec.md §3, §6).
//!
//! Unlike the teacher crate's `RoomActor`, a room here is a plain Store
//! record with no lifecycle states of its own — it exists from
//! `CreateRoom` until `CommitRoom` (graduates into a game) or until its
//! last member leaves (deleted).

use arcforge_protocol::{Player, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// One occupant of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "L: Serialize", deserialize = "L: Deserialize<'de>"))]
pub struct RoomMember<L> {
    pub entry_id: arcforge_protocol::EntryId,
    pub created_at_ms: u64,
    pub user_id: UserId,
    pub player: Player,
    pub loadout: L,
}

/// A room: an explicitly managed membership set that graduates into a
/// game on `CommitRoom`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize, L: Serialize",
    deserialize = "C: Deserialize<'de>, L: Deserialize<'de>"
))]
pub struct Room<C, L> {
    pub room_id: RoomId,
    pub num_players: usize,
    pub config: C,
    pub private: bool,
    pub members: Vec<RoomMember<L>>,
}

impl<C, L> Room<C, L> {
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.num_players
    }
}
