//! Lobby and per-game connection fan-out for Arcforge.
//!
//! This crate sits between `arcforge-protocol`'s wire `Envelope` and the
//! `Matchmaker`/`GameRuntime` layers below it (spec.md §4.4, §4.5): it
//! owns no persisted key family of its own, only the in-process
//! broadcast plumbing that turns Store changes into per-connection
//! diffs.

mod error;
mod game;
mod lobby;
mod messages;

pub use error::HubError;
pub use game::{GameConnection, GameHub};
pub use lobby::{LobbyConnection, LobbyHub};
pub use messages::{
    GameInbound, GameOutbound, LobbyInbound, LobbyOutbound, LobbyPropsDelta, RoomSummary,
};
