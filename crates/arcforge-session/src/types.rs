//! Persisted identity records: the data structures a `userId` and a
//! bearer token resolve to in the Store.
//!
//! Unlike the teacher crate's in-memory `Session`, a `User` is a durable
//! Store record — it outlives any one connection, and the same user can
//! reconnect (or have two tabs open) by presenting the same bearer token
//! or by minting a fresh one.

use arcforge_protocol::{EntryId, GameId, Player, QueueId, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// A user's durable record: identity plus the matchmaking/game
/// cross-references the Matchmaker and GameRuntime layers keep current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub player: Player,
    pub active_games: Vec<GameId>,
    pub room_entries: Vec<(RoomId, EntryId)>,
    pub queue_entries: Vec<(QueueId, EntryId)>,
}

impl User {
    pub fn new(user_id: UserId, player: Player) -> Self {
        Self {
            user_id,
            player,
            active_games: Vec::new(),
            room_entries: Vec::new(),
            queue_entries: Vec::new(),
        }
    }

    pub fn add_queue_entry(&mut self, queue_id: QueueId, entry_id: EntryId) {
        self.queue_entries.push((queue_id, entry_id));
    }

    pub fn remove_queue_entry(&mut self, queue_id: &QueueId, entry_id: &EntryId) {
        self.queue_entries
            .retain(|(q, e)| !(q == queue_id && e == entry_id));
    }

    pub fn add_room_entry(&mut self, room_id: RoomId, entry_id: EntryId) {
        self.room_entries.push((room_id, entry_id));
    }

    pub fn remove_room_entry(&mut self, room_id: &RoomId, entry_id: &EntryId) {
        self.room_entries
            .retain(|(r, e)| !(r == room_id && e == entry_id));
    }

    pub fn add_active_game(&mut self, game_id: GameId) {
        if !self.active_games.contains(&game_id) {
            self.active_games.push(game_id);
        }
    }

    pub fn remove_active_game(&mut self, game_id: &GameId) {
        self.active_games.retain(|g| g != game_id);
    }
}

/// A bearer token tying a connection to a `User`, with a finite TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub token_id: String,
    pub user_id: UserId,
    /// Milliseconds since the Unix epoch. Expiration is strict: a token
    /// with `expires_at_ms <= now` is rejected, never accepted.
    pub expires_at_ms: u64,
}

impl Token {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player {
            username: "alice".to_string(),
            is_guest: false,
        }
    }

    #[test]
    fn test_add_and_remove_queue_entry() {
        let mut user = User::new(UserId::new("u1"), player());
        let q = QueueId::new("q1");
        let e = EntryId::new("e1");
        user.add_queue_entry(q.clone(), e.clone());
        assert_eq!(user.queue_entries, vec![(q.clone(), e.clone())]);
        user.remove_queue_entry(&q, &e);
        assert!(user.queue_entries.is_empty());
    }

    #[test]
    fn test_add_active_game_is_idempotent() {
        let mut user = User::new(UserId::new("u1"), player());
        let g = GameId::new("g1");
        user.add_active_game(g.clone());
        user.add_active_game(g.clone());
        assert_eq!(user.active_games, vec![g]);
    }

    #[test]
    fn test_remove_active_game() {
        let mut user = User::new(UserId::new("u1"), player());
        let g = GameId::new("g1");
        user.add_active_game(g.clone());
        user.remove_active_game(&g);
        assert!(user.active_games.is_empty());
    }

    #[test]
    fn test_token_expiration_is_strict() {
        let token = Token {
            token_id: "t1".to_string(),
            user_id: UserId::new("u1"),
            expires_at_ms: 1_000,
        };
        assert!(token.is_expired(1_000));
        assert!(token.is_expired(1_001));
        assert!(!token.is_expired(999));
    }
}
