//! Persisted records owned by the game layer: the `games/{gameId}` and
//! `activegames` key families (spec.md §3, §6).

use arcforge_protocol::{GameId, Player, PlayerId, QueueId, UserId};
use serde::{Deserialize, Serialize};

use crate::logic::Game;

/// One queue a `Game` type accepts matchmaking requests on, as returned
/// by [`Game::queues`].
#[derive(Debug, Clone)]
pub struct QueueDef<Config> {
    pub queue_id: QueueId,
    pub num_players: usize,
    pub config: Config,
}

/// The persisted record for a single game instance.
///
/// `user_ids[i]` is the user occupying seat `i`; `players[i]` is that
/// seat's public identity snapshot captured at creation time — it does
/// not track later username changes, by design (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "G::Config: Serialize, G::State: Serialize, G::Outcome: Serialize",
    deserialize = "G::Config: Deserialize<'de>, G::State: Deserialize<'de>, G::Outcome: Deserialize<'de>"
))]
pub struct GameRecord<G: Game> {
    pub game_id: GameId,
    pub config: G::Config,
    pub game_state: G::State,
    pub user_ids: Vec<UserId>,
    pub players: Vec<Player>,
    pub outcome: Option<G::Outcome>,
}

impl<G: Game> GameRecord<G> {
    pub fn num_players(&self) -> usize {
        self.user_ids.len()
    }

    /// The seat index `user_id` occupies, if any.
    pub fn seat_of(&self, user_id: &UserId) -> Option<PlayerId> {
        self.user_ids
            .iter()
            .position(|u| u == user_id)
            .map(|i| PlayerId(i as u64))
    }
}

/// One entry in the `ActiveGames` singleton listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "G::Config: Serialize",
    deserialize = "G::Config: Deserialize<'de>"
))]
pub struct ActiveGameEntry<G: Game> {
    pub game_id: GameId,
    pub players: Vec<Player>,
    pub config: G::Config,
    pub created_at_ms: u64,
}

/// The `ActiveGames` singleton: every game currently in progress, in
/// creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "G::Config: Serialize",
    deserialize = "G::Config: Deserialize<'de>"
))]
pub struct ActiveGames<G: Game> {
    pub entries: Vec<ActiveGameEntry<G>>,
}

impl<G: Game> Default for ActiveGames<G> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<G: Game> ActiveGames<G> {
    pub fn push(&mut self, entry: ActiveGameEntry<G>) {
        self.entries.push(entry);
    }

    pub fn remove(&mut self, game_id: &GameId) {
        self.entries.retain(|e| &e.game_id != game_id);
    }
}
