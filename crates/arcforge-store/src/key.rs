//! Ordered keys over the key-value store.
//!
//! A [`Key`] is a sequence of string segments with a canonical `/`-joined
//! representation. `ListByPrefix` is literally "every key whose canonical
//! string starts with the prefix's canonical string plus `/`" — this keeps
//! the store's notion of "prefix" simple and matches the key families
//! named in the spec (`users/{userId}`, `queueentry/{queueId}/{entryId}`,
//! ...).

use std::fmt;

/// An ordered key in the store's keyspace.
///
/// Two keys compare equal/ordered by their canonical string, so
/// lexicographic listing (`ListByPrefix`) is well-defined regardless of
/// segment count.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Builds a key from segments, joined with `/`.
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let joined = segments
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// A single-segment key, for singleton records like `activegames`.
    pub fn singleton(name: &str) -> Self {
        Self(name.to_string())
    }

    /// `true` if `self` lies under `prefix` (i.e. `self == prefix` or
    /// `self` starts with `prefix` followed by `/`).
    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.0 == prefix.0 || self.0.starts_with(&format!("{}/", prefix.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Key-family builders — the key layout named in spec.md §6.
// ---------------------------------------------------------------------------

pub fn user_key(user_id: &str) -> Key {
    Key::new(["users", user_id])
}

pub fn username_index_key(username: &str) -> Key {
    Key::new(["usersByUsername", username])
}

pub fn token_key(token: &str) -> Key {
    Key::new(["tokens", token])
}

pub fn queue_entry_key(queue_id: &str, entry_id: &str) -> Key {
    Key::new(["queueentry", queue_id, entry_id])
}

pub fn queue_prefix(queue_id: &str) -> Key {
    Key::new(["queueentry", queue_id])
}

pub fn room_key(room_id: &str) -> Key {
    Key::new(["rooms", room_id])
}

pub fn room_prefix() -> Key {
    Key::singleton("rooms")
}

pub fn room_list_trigger_key() -> Key {
    Key::singleton("roomlisttrigger")
}

pub fn active_games_key() -> Key {
    Key::singleton("activegames")
}

pub fn game_key(game_id: &str) -> Key {
    Key::new(["games", game_id])
}

pub fn assignment_key(entry_id: &str) -> Key {
    Key::new(["assignments", entry_id])
}
