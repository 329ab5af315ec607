//! Error types for the matchmaking layer.

use arcforge_protocol::{RoomId, UserId};

/// Errors that can occur while joining, leaving, or committing queues
/// and rooms.
#[derive(Debug, thiserror::Error)]
pub enum MatchmakerError {
    /// No room exists for the given id.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// `CreateRoom` was called with an id that already exists.
    #[error("room {0} already exists")]
    RoomAlreadyExists(RoomId),

    /// `AddToRoom` found the room already at `numPlayers` members.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// `CommitRoom` was called with fewer members than `numPlayers`.
    #[error("room {room_id} has {have} of {need} players required to commit")]
    RoomUnderfull {
        room_id: RoomId,
        have: usize,
        need: usize,
    },

    /// A queue or room entry referenced a user record that no longer
    /// exists — a dangling reference, not a normal race.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// A lower-level session failure (user lookup) propagated up.
    #[error(transparent)]
    Session(#[from] arcforge_session::SessionError),

    /// A lower-level store failure propagated up.
    #[error(transparent)]
    Store(#[from] arcforge_store::StoreError),
}
