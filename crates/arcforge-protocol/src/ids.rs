//! Identifiers for every addressable entity in the system.
//!
//! Most of these wrap an opaque `String` rather than the teacher crate's
//! `u64` — the data model calls for ids that are "opaque, sortable, unique
//! strings (time-ordered preferred)" so they can be handed out by any
//! process without a shared counter. `PlayerId` is the one exception: it
//! identifies a *seat* within a single game (`userIds[i]`/`players[i]`),
//! a small dense index the author's game logic indexes arrays with, so it
//! stays a `u64` exactly as in the teacher crate.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }
    };
}

string_id!(UserId, "U");
string_id!(TokenId, "T");
string_id!(QueueId, "Q");
string_id!(RoomId, "R");
string_id!(GameId, "G");
string_id!(EntryId, "E");

/// The seat index of a player within a single game (`0..numPlayers`).
///
/// Unlike the other ids this is dense and game-scoped, not globally
/// unique — it's an index into `Game::userIds`/`Game::players`, which is
/// exactly how the teacher's `GameLogic::init(&players: &[PlayerId])`
/// used it, just no longer a connection-global identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_serializes_transparently() {
        let id = UserId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn test_string_id_display_prefixes() {
        assert_eq!(GameId::new("xyz").to_string(), "G-xyz");
        assert_eq!(UserId::new("xyz").to_string(), "U-xyz");
    }

    #[test]
    fn test_string_ids_sort_lexicographically() {
        let mut ids = vec![EntryId::new("b"), EntryId::new("a"), EntryId::new("c")];
        ids.sort();
        assert_eq!(ids, vec![EntryId::new("a"), EntryId::new("b"), EntryId::new("c")]);
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(3).to_string(), "P-3");
    }
}
