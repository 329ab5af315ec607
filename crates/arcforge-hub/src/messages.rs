//! The lobby and game message channels (spec.md §6): what travels inside
//! `Payload::Lobby`/`Payload::Game` once a connection has picked a `Game`
//! type. `arcforge-protocol` only knows these bytes exist; this crate is
//! where they get a shape.

use arcforge_game::{ActiveGameEntry, Game};
use arcforge_protocol::{EntryId, GameId, Player, QueueId, RoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lobby channel
// ---------------------------------------------------------------------------

/// A room's publicly listable shape: enough to render a "join this room"
/// row, with no member identities or loadouts beyond the seated players.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "C: Serialize", deserialize = "C: Deserialize<'de>"))]
pub struct RoomSummary<C> {
    pub room_id: RoomId,
    pub num_players: usize,
    pub config: C,
    pub players: Vec<Player>,
}

/// Client → Server, over `Payload::Lobby`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    bound(
        serialize = "G::Config: Serialize, G::Loadout: Serialize",
        deserialize = "G::Config: Deserialize<'de>, G::Loadout: Deserialize<'de>"
    )
)]
pub enum LobbyInbound<G: Game> {
    /// Seeds this connection's diff caches with what the client already
    /// believes is true, so the first real update only carries what
    /// actually changed since (spec.md §4.4).
    Initialize {
        active_games: Vec<ActiveGameEntry<G>>,
        available_rooms: Vec<RoomSummary<G::Config>>,
    },
    JoinQueue {
        queue_id: QueueId,
        loadout: G::Loadout,
    },
    CreateAndJoinRoom {
        config: G::Config,
        num_players: usize,
        private: bool,
        loadout: G::Loadout,
    },
    JoinRoom {
        room_id: RoomId,
        loadout: G::Loadout,
    },
    CommitRoom {
        room_id: RoomId,
    },
    LeaveMatchmaking,
    UpdateUsername {
        username: String,
    },
}

/// Partial lobby state: only the fields that changed since the last
/// update sent on this connection are `Some` (spec.md §4.4's diff
/// contract). Never emitted with every field `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "G::Config: Serialize",
    deserialize = "G::Config: Deserialize<'de>"
))]
pub struct LobbyPropsDelta<G: Game> {
    pub all_active_games: Option<Vec<ActiveGameEntry<G>>>,
    pub all_available_rooms: Option<Vec<RoomSummary<G::Config>>>,
    pub user_active_games: Option<Vec<GameId>>,
    pub player: Option<Player>,
    pub room_entries: Option<Vec<(RoomId, EntryId)>>,
    pub queue_entries: Option<Vec<(QueueId, EntryId)>>,
}

impl<G: Game> Default for LobbyPropsDelta<G> {
    fn default() -> Self {
        Self {
            all_active_games: None,
            all_available_rooms: None,
            user_active_games: None,
            player: None,
            room_entries: None,
            queue_entries: None,
        }
    }
}

impl<G: Game> LobbyPropsDelta<G> {
    pub fn is_empty(&self) -> bool {
        self.all_active_games.is_none()
            && self.all_available_rooms.is_none()
            && self.user_active_games.is_none()
            && self.player.is_none()
            && self.room_entries.is_none()
            && self.queue_entries.is_none()
    }
}

/// Server → Client, over `Payload::Lobby`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    bound(
        serialize = "G::Config: Serialize",
        deserialize = "G::Config: Deserialize<'de>"
    )
)]
pub enum LobbyOutbound<G: Game> {
    /// A queue or room entry owned by this connection's user graduated
    /// into a game.
    GameAssignment { game_id: GameId },
    UpdateLobbyProps { props: LobbyPropsDelta<G> },
    DisplayError { message: String },
}

// ---------------------------------------------------------------------------
// Game channel
// ---------------------------------------------------------------------------

/// Client → Server, over `Payload::Game`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    bound(
        serialize = "G::Move: Serialize, G::PublicState: Serialize, G::PlayerState: Serialize",
        deserialize = "G::Move: Deserialize<'de>, G::PublicState: Deserialize<'de>, G::PlayerState: Deserialize<'de>"
    )
)]
pub enum GameInbound<G: Game> {
    /// Seeds this connection's diff cache (spec.md §4.5), same purpose as
    /// the lobby channel's `Initialize`.
    Initialize {
        current_public_state: Option<G::PublicState>,
        current_player_state: Option<G::PlayerState>,
    },
    Move { mv: G::Move },
}

/// Server → Client, over `Payload::Game`. Unlike the lobby channel this
/// is sent whole rather than diffed field-by-field — `public_state` and
/// `player_state` are each only resent when they individually change
/// (spec.md §4.5), but within one message both always describe the
/// connection's full current view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    bound(
        serialize = "G::PublicState: Serialize, G::PlayerState: Serialize, G::Outcome: Serialize",
        deserialize = "G::PublicState: Deserialize<'de>, G::PlayerState: Deserialize<'de>, G::Outcome: Deserialize<'de>"
    )
)]
pub enum GameOutbound<G: Game> {
    UpdateGameState {
        public_state: Option<G::PublicState>,
        player_state: Option<G::PlayerState>,
        outcome: Option<G::Outcome>,
    },
    DisplayError {
        message: String,
    },
}
