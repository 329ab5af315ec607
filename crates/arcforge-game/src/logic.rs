//! The `Game` trait — the single extension point a game author implements.
//!
//! This generalizes the teacher crate's `GameLogic`: instead of a
//! real-time `tick`/`handle_message` loop owned by a per-room actor, a
//! `Game` is a pure state machine over turn-based moves, applied by
//! [`crate::runtime::GameRuntime`] under optimistic concurrency. Every
//! method here is a plain pure function — the framework may call any of
//! them more than once per logical event (retries, fan-out), so none of
//! them may have side effects.

use arcforge_protocol::PlayerId;
use serde::{de::DeserializeOwned, Serialize};

use crate::record::QueueDef;

/// The contract a game author implements to define a turn-based game.
///
/// Associated types describe the shape of the game's data; the methods
/// describe its rules. `setup`/`is_valid_move`/`process_move`/`outcome`
/// must be pure and deterministic — the core relies on calling them
/// repeatedly with the same inputs to produce the same outputs across
/// retries.
pub trait Game: Send + Sync + 'static {
    /// Per-deployment configuration for one game instance (board size,
    /// time limit, ...).
    type Config: Send + Sync + Clone + Serialize + DeserializeOwned;
    /// The full, persisted game state.
    type State: Send + Sync + Clone + Serialize + DeserializeOwned;
    /// A single player's move.
    type Move: Send + Sync + Clone + Serialize + DeserializeOwned;
    /// Opaque per-player configuration supplied at queue/room join time.
    type Loadout: Send + Sync + Clone + Serialize + DeserializeOwned;
    /// A single seat's private view of the state.
    type PlayerState: Send + Sync + Clone + Serialize + DeserializeOwned;
    /// The state projection shared by every seat and every observer.
    type PublicState: Send + Sync + Clone + Serialize + DeserializeOwned;
    /// The terminal value a finished game settles to.
    type Outcome: Send + Sync + Clone + Serialize + DeserializeOwned;

    /// The queues this game type accepts matchmaking requests on.
    fn queues() -> Vec<QueueDef<Self::Config>>;

    /// Builds the initial state for a freshly graduated game.
    fn setup(
        config: &Self::Config,
        num_players: usize,
        loadouts: &[Self::Loadout],
        created_at_ms: u64,
    ) -> Self::State;

    /// `true` if `mv` is legal to apply to `state` right now.
    fn is_valid_move(state: &Self::State, ctx: &MoveContext<Self>) -> bool;

    /// Applies `ctx.mv` to `state`, producing the next state. Only ever
    /// called after `is_valid_move` returned `true` for the same
    /// arguments.
    fn process_move(state: &Self::State, ctx: &MoveContext<Self>) -> Self::State;

    /// Returns the terminal outcome if `state` is a finished position,
    /// `None` while the game is still in progress.
    fn outcome(state: &Self::State, ctx: &OutcomeContext<Self>) -> Option<Self::Outcome>;

    /// Projects `state` into one seat's private view.
    fn player_state(state: &Self::State, ctx: &ProjectionContext<Self>) -> Self::PlayerState;

    /// Projects `state` into the view shared by every seat and observer.
    fn public_state(state: &Self::State, ctx: &ProjectionContext<Self>) -> Self::PublicState;

    /// Validates a loadout at matchmaking-request time. Default: accept
    /// everything.
    fn is_valid_loadout(_loadout: &Self::Loadout) -> bool {
        true
    }

    /// Validates a room creation request at request time. Default:
    /// accept everything.
    fn is_valid_room(_config: &Self::Config, _num_players: usize) -> bool {
        true
    }
}

/// Everything `is_valid_move`/`process_move` need to evaluate one move.
pub struct MoveContext<'a, G: Game + ?Sized> {
    pub config: &'a G::Config,
    pub num_players: usize,
    pub player_id: PlayerId,
    pub timestamp_ms: u64,
    pub mv: &'a G::Move,
}

/// Everything `outcome` needs to decide whether a state is terminal.
pub struct OutcomeContext<'a, G: Game + ?Sized> {
    pub config: &'a G::Config,
    pub num_players: usize,
    pub timestamp_ms: u64,
}

/// Everything `player_state`/`public_state` need to project a state.
/// `player_id` is `None` when projecting `public_state` for an observer
/// or for the public view itself.
pub struct ProjectionContext<'a, G: Game + ?Sized> {
    pub config: &'a G::Config,
    pub num_players: usize,
    pub timestamp_ms: u64,
    pub player_id: Option<PlayerId>,
}
