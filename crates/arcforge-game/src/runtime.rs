//! GameRuntime: applies a validated move to a game record under
//! optimistic concurrency (spec.md §4.3 `HandleMove`).

use arcforge_protocol::PlayerId;
use arcforge_store::{
    active_games_key, game_key, retry_commit, CommitRequest, Mutation, Precondition, Store,
    StoreError, Versionstamp,
};

use crate::error::GameError;
use crate::logic::{Game, MoveContext, OutcomeContext};
use crate::record::{ActiveGames, GameRecord};

/// Reads a game's current record and versionstamp. Errors with
/// [`GameError::NotFound`] if no such game exists.
pub async fn read_game<G: Game>(
    store: &Store,
    game_id: &arcforge_protocol::GameId,
) -> Result<(GameRecord<G>, Versionstamp), GameError> {
    store
        .get::<GameRecord<G>>(&game_key(game_id.as_str()))
        .await?
        .ok_or_else(|| GameError::NotFound(game_id.clone()))
}

/// Applies `mv` to the game `game_id` on behalf of seat `player_id`.
///
/// Reads the game record; if `outcome` is already set, or the move is
/// not valid for the current state, this is a silent no-op (spec.md
/// §4.3, §7). Otherwise computes the next state and outcome via the
/// author's pure callbacks, then atomically writes the updated record
/// and, if the game just ended, removes it from `ActiveGames` in the
/// same commit. Retries on conflict; the author's functions must be
/// pure so re-applying them on a retry is safe.
pub async fn handle_move<G: Game>(
    store: &Store,
    game_id: &arcforge_protocol::GameId,
    player_id: PlayerId,
    mv: &G::Move,
    now_ms: u64,
) -> Result<(), GameError> {
    let key = game_key(game_id.as_str());

    retry_commit(store, |store| {
        let key = key.clone();
        let game_id = game_id.clone();
        async move {
            let (record, version): (GameRecord<G>, Versionstamp) = store
                .get(&key)
                .await?
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;

            if record.outcome.is_some() {
                return Ok(CommitRequest::new());
            }

            let num_players = record.num_players();
            let move_ctx = MoveContext {
                config: &record.config,
                num_players,
                player_id,
                timestamp_ms: now_ms,
                mv,
            };

            if !G::is_valid_move(&record.game_state, &move_ctx) {
                return Ok(CommitRequest::new());
            }

            let new_state = G::process_move(&record.game_state, &move_ctx);
            let outcome_ctx = OutcomeContext {
                config: &record.config,
                num_players,
                timestamp_ms: now_ms,
            };
            let outcome = G::outcome(&new_state, &outcome_ctx);

            let mut updated = record;
            updated.game_state = new_state;
            updated.outcome = outcome.clone();

            let mut request = CommitRequest::new()
                .require(Precondition::version(key.clone(), version))
                .write(Mutation::Put(
                    key.clone(),
                    serde_json::to_vec(&updated).map_err(StoreError::Encode)?,
                ));

            if outcome.is_some() {
                let (mut active, active_precondition) = store
                    .get_singleton_or_default::<ActiveGames<G>>(&active_games_key())
                    .await?;
                active.remove(&game_id);
                request = request.require(active_precondition).write(Mutation::Put(
                    active_games_key(),
                    serde_json::to_vec(&active).map_err(StoreError::Encode)?,
                ));
            }

            Ok(request)
        }
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::ProjectionContext;
    use crate::record::QueueDef;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Config;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct State {
        value: u32,
    }
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Move;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Loadout;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Outcome(String);

    struct Counter;
    impl Game for Counter {
        type Config = Config;
        type State = State;
        type Move = Move;
        type Loadout = Loadout;
        type PlayerState = State;
        type PublicState = State;
        type Outcome = Outcome;

        fn queues() -> Vec<QueueDef<Self::Config>> {
            Vec::new()
        }
        fn setup(_c: &Self::Config, _n: usize, _l: &[Self::Loadout], _t: u64) -> Self::State {
            State { value: 0 }
        }
        fn is_valid_move(_s: &Self::State, _ctx: &MoveContext<Self>) -> bool {
            true
        }
        fn process_move(s: &Self::State, _ctx: &MoveContext<Self>) -> Self::State {
            State { value: s.value + 1 }
        }
        fn outcome(s: &Self::State, _ctx: &OutcomeContext<Self>) -> Option<Self::Outcome> {
            (s.value >= 5).then(|| Outcome("done".into()))
        }
        fn player_state(s: &Self::State, _ctx: &ProjectionContext<Self>) -> Self::PlayerState {
            s.clone()
        }
        fn public_state(s: &Self::State, _ctx: &ProjectionContext<Self>) -> Self::PublicState {
            s.clone()
        }
    }

    use arcforge_protocol::{GameId, Player, UserId};

    async fn seed_game(store: &Store, value: u32) -> GameId {
        let game_id = GameId::new("g1");
        let record = GameRecord::<Counter> {
            game_id: game_id.clone(),
            config: Config,
            game_state: State { value },
            user_ids: vec![UserId::new("u1"), UserId::new("u2")],
            players: vec![
                Player { username: "a".into(), is_guest: false },
                Player { username: "b".into(), is_guest: false },
            ],
            outcome: None,
        };
        store
            .put(game_key(game_id.as_str()), &record)
            .await
            .unwrap();
        game_id
    }

    #[tokio::test]
    async fn test_handle_move_applies_and_persists() {
        let store = Store::new();
        let game_id = seed_game(&store, 0).await;

        handle_move::<Counter>(&store, &game_id, PlayerId(0), &Move, 0)
            .await
            .unwrap();

        let (record, _) = read_game::<Counter>(&store, &game_id).await.unwrap();
        assert_eq!(record.game_state.value, 1);
        assert!(record.outcome.is_none());
    }

    #[tokio::test]
    async fn test_handle_move_sets_outcome_and_clears_active_games() {
        let store = Store::new();
        let game_id = seed_game(&store, 4).await;
        store
            .put(
                active_games_key(),
                &ActiveGames::<Counter> {
                    entries: vec![crate::record::ActiveGameEntry {
                        game_id: game_id.clone(),
                        players: Vec::new(),
                        config: Config,
                        created_at_ms: 0,
                    }],
                },
            )
            .await
            .unwrap();

        handle_move::<Counter>(&store, &game_id, PlayerId(0), &Move, 0)
            .await
            .unwrap();

        let (record, _) = read_game::<Counter>(&store, &game_id).await.unwrap();
        assert_eq!(record.outcome.as_ref().unwrap().0, "done");

        let (active, _): (ActiveGames<Counter>, _) =
            store.get(&active_games_key()).await.unwrap().unwrap();
        assert!(active.entries.is_empty());
    }

    #[tokio::test]
    async fn test_handle_move_is_silent_noop_once_outcome_set() {
        let store = Store::new();
        let game_id = seed_game(&store, 5).await;
        handle_move::<Counter>(&store, &game_id, PlayerId(0), &Move, 0)
            .await
            .unwrap();
        let (first, _) = read_game::<Counter>(&store, &game_id).await.unwrap();

        handle_move::<Counter>(&store, &game_id, PlayerId(0), &Move, 0)
            .await
            .unwrap();
        let (second, _) = read_game::<Counter>(&store, &game_id).await.unwrap();

        assert_eq!(first.game_state.value, second.game_state.value);
    }

    #[tokio::test]
    async fn test_handle_move_on_missing_game_errors() {
        let store = Store::new();
        let result =
            handle_move::<Counter>(&store, &GameId::new("missing"), PlayerId(0), &Move, 0).await;
        assert!(matches!(result, Err(GameError::Store(_))));
    }
}
