//! Initial-props surface (spec.md §4.6): the HTTP-shaped RPCs a caller
//! uses before opening a lobby or game WebSocket connection. Unlike the
//! connection setup calls, these never fail on a missing or expired
//! token — `get_initial_lobby_props` mints a fresh guest, and
//! `get_initial_game_props` simply demotes to an observer view.

use std::time::{SystemTime, UNIX_EPOCH};

use arcforge_game::{ActiveGameEntry, ActiveGames, Game, ProjectionContext};
use arcforge_matchmaker::Room;
use arcforge_protocol::{GameId, Player, PlayerId};
use arcforge_session::{DEFAULT_TOKEN_TTL_DAYS, User};
use arcforge_store::{active_games_key, room_prefix, IdGenerator, Store};
use arcforge_hub::RoomSummary;

use crate::ArcforgeError;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}

/// The `{activeGames, availableRooms, user}` snapshot returned by
/// `GetInitialLobbyProps`.
#[derive(Debug, Clone)]
pub struct LobbyProps<G: Game> {
    pub active_games: Vec<ActiveGameEntry<G>>,
    pub available_rooms: Vec<RoomSummary<G::Config>>,
    pub user: Player,
}

/// The `{players, publicState, playerId?, playerState?, outcome?}`
/// snapshot returned by `GetInitialGameProps`.
#[derive(Debug, Clone)]
pub struct GameProps<G: Game> {
    pub players: Vec<Player>,
    pub public_state: G::PublicState,
    pub player_id: Option<PlayerId>,
    pub player_state: Option<G::PlayerState>,
    pub outcome: Option<G::Outcome>,
}

/// `GetInitialLobbyProps(token?) → {props, token}` (spec.md §4.6). If
/// `token` resolves to a live user, reuses it; otherwise mints a fresh
/// guest and a 30-day token.
pub async fn get_initial_lobby_props<G: Game>(
    store: &Store,
    id_gen: &IdGenerator,
    token: Option<&str>,
) -> Result<(LobbyProps<G>, String), ArcforgeError> {
    let (token_id, user) = match token {
        Some(t) => match arcforge_session::resolve_token(store, t).await {
            Ok((token, user)) => (token.token_id, user),
            Err(_) => mint_guest(store, id_gen).await?,
        },
        None => mint_guest(store, id_gen).await?,
    };

    let active_games = current_active_games::<G>(store).await?;
    let available_rooms = current_available_rooms::<G>(store).await?;

    Ok((
        LobbyProps {
            active_games,
            available_rooms,
            user: user.player,
        },
        token_id,
    ))
}

/// `GetInitialGameProps(gameId, token?) → props` (spec.md §4.6). A
/// missing, invalid, or expired token resolves to an observer view
/// rather than an error.
pub async fn get_initial_game_props<G: Game>(
    store: &Store,
    game_id: &GameId,
    token: Option<&str>,
) -> Result<GameProps<G>, ArcforgeError> {
    let (record, _) = arcforge_game::read_game::<G>(store, game_id).await?;

    let player_id = match token {
        Some(t) => match arcforge_session::resolve_token(store, t).await {
            Ok((_, user)) => record.seat_of(&user.user_id),
            Err(_) => None,
        },
        None => None,
    };

    let ctx = ProjectionContext {
        config: &record.config,
        num_players: record.num_players(),
        timestamp_ms: now_ms(),
        player_id,
    };
    let public_state = G::public_state(&record.game_state, &ctx);
    let player_state = player_id.map(|_| G::player_state(&record.game_state, &ctx));

    Ok(GameProps {
        players: record.players.clone(),
        public_state,
        player_id,
        player_state,
        outcome: record.outcome.clone(),
    })
}

async fn mint_guest(store: &Store, id_gen: &IdGenerator) -> Result<(String, User), ArcforgeError> {
    let user = arcforge_session::create_guest_user(store, id_gen).await?;
    let token = arcforge_session::issue_token(store, user.user_id.clone(), DEFAULT_TOKEN_TTL_DAYS).await?;
    Ok((token.token_id, user))
}

async fn current_active_games<G: Game>(store: &Store) -> Result<Vec<ActiveGameEntry<G>>, ArcforgeError> {
    Ok(store
        .get::<ActiveGames<G>>(&active_games_key())
        .await?
        .map(|(active, _)| active.entries)
        .unwrap_or_default())
}

async fn current_available_rooms<G: Game>(
    store: &Store,
) -> Result<Vec<RoomSummary<G::Config>>, ArcforgeError> {
    let listed = store
        .list_by_prefix::<Room<G::Config, G::Loadout>>(&room_prefix())
        .await?;
    Ok(listed
        .into_iter()
        .filter(|(_, room, _)| !room.private)
        .map(|(_, room, _)| RoomSummary {
            room_id: room.room_id,
            num_players: room.num_players,
            config: room.config,
            players: room.members.into_iter().map(|m| m.player).collect(),
        })
        .collect())
}
