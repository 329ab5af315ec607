//! Matchmaking for Arcforge: queues that graduate on their own once
//! full, and rooms that graduate explicitly via `CommitRoom` (spec.md
//! §4.2).
//!
//! Neither a queue nor a room is a live task — both are Store records,
//! and "matchmaking" here means a handful of free functions that read,
//! recompute, and atomically commit those records. The Hub layer above
//! calls these directly off incoming lobby messages; there is no
//! separate actor to route through.

mod assignment;
mod error;
mod matchmaker;
mod queue;
mod room;

pub use assignment::Assignment;
pub use error::MatchmakerError;
pub use matchmaker::{
    add_to_queue, add_to_room, commit_room, create_room, maybe_graduate_queue, remove_from_queue,
    remove_from_room,
};
pub use queue::QueueEntry;
pub use room::{Room, RoomMember};
