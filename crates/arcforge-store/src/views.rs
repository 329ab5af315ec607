//! Convenience constructors for the handful of watches every higher
//! layer needs, named the way spec.md §4.1 names them. Each one just
//! pairs the right key-family builder from [`crate::key`] with
//! [`Store::watch`] — the actual derived projection (filtering available
//! rooms, decoding a game's public state, ...) is the caller's job, since
//! it needs domain types this crate doesn't know about.

use crate::key;
use crate::store::Store;
use crate::watch::WatchHandle;

impl Store {
    /// Fires whenever the set of open rooms changes shape (room created,
    /// committed, or abandoned) — re-list [`crate::key::room_prefix`]
    /// after each wakeup to get the fresh set.
    pub fn watch_available_room_list(&self) -> WatchHandle {
        self.watch(vec![key::room_list_trigger_key()])
    }

    /// Fires whenever a queue graduates or a room commits and changes the
    /// active-games singleton.
    pub fn watch_active_game_list(&self) -> WatchHandle {
        self.watch(vec![key::active_games_key()])
    }

    /// Fires whenever the named game's state changes (a move was played,
    /// an outcome was set).
    pub fn watch_game(&self, game_id: &str) -> WatchHandle {
        self.watch(vec![key::game_key(game_id)])
    }

    /// Fires once the named queue/room entry is assigned a game (or, for
    /// a room entry, the room itself commits).
    pub fn watch_assignment(&self, entry_id: &str) -> WatchHandle {
        self.watch(vec![key::assignment_key(entry_id)])
    }

    /// Fires whenever the named user's record changes (username update).
    pub fn watch_user(&self, user_id: &str) -> WatchHandle {
        self.watch(vec![key::user_key(user_id)])
    }
}
