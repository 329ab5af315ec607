//! Per-game fan-out (spec.md §4.5): one shared driver per live `gameId`,
//! refcounted across every connection watching that game, computing
//! `public_state` once and letting each connection derive its own
//! `player_state` and suppress no-op diffs independently. Mirrors the
//! teacher's `RoomHandle` — a handle per entity, torn down when its last
//! holder drops — except here the entity is a game record instead of a
//! room, and the driver only pushes "state changed", never applies a
//! move itself.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use arcforge_game::{self as game, Game, GameRecord};
use arcforge_protocol::{GameId, PlayerId};
use arcforge_store::{game_key, Store};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::HubError;
use crate::messages::{GameInbound, GameOutbound};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}

struct DriverEntry<G: Game> {
    refcount: usize,
    latest: watch::Receiver<Option<GameRecord<G>>>,
    _driver: JoinHandle<()>,
}

/// Shared per-process fan-out for one `Game` type. Tracks one background
/// driver per `gameId` currently being watched by at least one
/// connection; the last connection to leave tears its driver down.
pub struct GameHub<G: Game> {
    store: Store,
    drivers: Arc<Mutex<HashMap<GameId, DriverEntry<G>>>>,
    _marker: PhantomData<fn() -> G>,
}

impl<G: Game> Clone for GameHub<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            drivers: Arc::clone(&self.drivers),
            _marker: PhantomData,
        }
    }
}

impl<G: Game> GameHub<G> {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            drivers: Arc::new(Mutex::new(HashMap::new())),
            _marker: PhantomData,
        }
    }

    /// Opens a connection watching `game_id`. `player_id` is the
    /// connecting user's seat, or `None` for an observer with no seat —
    /// an observer never gets `player_state`, only `public_state` and
    /// `outcome` (spec.md §4.5, §4.6). Starts the shared driver for this
    /// game if this is the first connection to it; otherwise joins the
    /// existing one.
    pub async fn connect(
        &self,
        game_id: GameId,
        player_id: Option<PlayerId>,
    ) -> Result<GameConnection<G>, HubError> {
        let (record, _) = game::read_game::<G>(&self.store, &game_id).await?;

        let latest = {
            let mut drivers = self.drivers.lock().expect("driver map poisoned");
            match drivers.get_mut(&game_id) {
                Some(entry) => {
                    entry.refcount += 1;
                    entry.latest.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(Some(record));
                    let driver = tokio::spawn(run_driver::<G>(
                        self.store.clone(),
                        game_id.clone(),
                        tx,
                    ));
                    drivers.insert(
                        game_id.clone(),
                        DriverEntry {
                            refcount: 1,
                            latest: rx.clone(),
                            _driver: driver,
                        },
                    );
                    rx
                }
            }
        };

        Ok(GameConnection {
            hub: self.clone(),
            game_id,
            player_id,
            latest,
            last_public: None,
            last_player: None,
            // `outcome` has no equivalent in `Initialize`'s baseline (spec.md
            // §4.5 only asserts public/player state), so every connection
            // starts out believing the default, pre-terminal value: none.
            // A game that's already finished when this connection attaches
            // still reports its outcome once, since `Some(outcome)` differs
            // from this seed.
            last_outcome: Some(serde_json::Value::Null),
        })
    }

    fn release(&self, game_id: &GameId) {
        let mut drivers = self.drivers.lock().expect("driver map poisoned");
        if let Some(entry) = drivers.get_mut(game_id) {
            entry.refcount -= 1;
            if entry.refcount == 0 {
                drivers.remove(game_id);
            }
        }
    }
}

/// Re-reads `game_id` on every change and republishes it. Exits once the
/// record is gone, the store stops reporting changes, or nobody is
/// watching this channel any more.
async fn run_driver<G: Game>(
    store: Store,
    game_id: GameId,
    tx: watch::Sender<Option<GameRecord<G>>>,
) {
    let mut watch_handle = store.watch(vec![game_key(game_id.as_str())]);
    loop {
        if tx.is_closed() {
            return;
        }
        match watch_handle.next().await {
            Ok(snapshot) => {
                let value = match &snapshot[0] {
                    Some((bytes, _)) => serde_json::from_slice::<GameRecord<G>>(bytes).ok(),
                    None => None,
                };
                if tx.send(value).is_err() {
                    return;
                }
            }
            Err(_) => return,
        }
    }
}

/// One connection watching a single game. Computes its own
/// `player_state` from the shared `public_state`/full record the hub's
/// driver republishes, and only emits an update when something it
/// actually sent last time has changed.
pub struct GameConnection<G: Game> {
    hub: GameHub<G>,
    game_id: GameId,
    player_id: Option<PlayerId>,
    latest: watch::Receiver<Option<GameRecord<G>>>,
    last_public: Option<serde_json::Value>,
    last_player: Option<serde_json::Value>,
    last_outcome: Option<serde_json::Value>,
}

impl<G: Game> GameConnection<G> {
    /// Handles one inbound message, returning zero or more outbound
    /// replies.
    pub async fn handle_inbound(&mut self, msg: GameInbound<G>) -> Vec<GameOutbound<G>> {
        match msg {
            GameInbound::Initialize {
                current_public_state,
                current_player_state,
            } => {
                self.last_public = current_public_state
                    .map(|s| serde_json::to_value(&s).expect("serializable"));
                self.last_player = current_player_state
                    .map(|s| serde_json::to_value(&s).expect("serializable"));
                // Correct any divergence between the client's asserted
                // baseline and reality exactly once (spec.md §4.5) — the
                // watch channel won't fire again on its own if nothing
                // changes after this connection attaches.
                let record = self.latest.borrow().clone();
                match record.and_then(|r| self.diff(r)) {
                    Some(update) => vec![update],
                    None => Vec::new(),
                }
            }
            GameInbound::Move { mv } => {
                // Rejected silently if the connection has no `playerId`
                // (spec.md §4.5, §7) — an observer's move is a no-op, not
                // a `DisplayError`.
                let Some(player_id) = self.player_id else {
                    return Vec::new();
                };
                match game::handle_move::<G>(
                    &self.hub.store,
                    &self.game_id,
                    player_id,
                    &mv,
                    now_ms(),
                )
                .await
                {
                    Ok(()) => Vec::new(),
                    Err(e) => vec![GameOutbound::DisplayError {
                        message: e.to_string(),
                    }],
                }
            }
        }
    }

    /// Waits for the next genuinely new state to tell this connection.
    /// `None` once the driver has exited (the game is gone or the store
    /// is shutting down).
    pub async fn next_update(&mut self) -> Option<GameOutbound<G>> {
        loop {
            if self.latest.changed().await.is_err() {
                return None;
            }
            let record = self.latest.borrow_and_update().clone();
            let Some(record) = record else {
                return None;
            };
            if let Some(update) = self.diff(record) {
                return Some(update);
            }
        }
    }

    /// Projects `record` for this connection's seat and compares it
    /// against the last-sent cache, returning an update only if something
    /// actually changed.
    fn diff(&mut self, record: GameRecord<G>) -> Option<GameOutbound<G>> {
        let num_players = record.num_players();
        let ctx = game::ProjectionContext {
            config: &record.config,
            num_players,
            timestamp_ms: now_ms(),
            player_id: self.player_id,
        };
        let public_state = G::public_state(&record.game_state, &ctx);
        let player_state = self.player_id.map(|_| G::player_state(&record.game_state, &ctx));

        let public_changed = changed(&public_state, &mut self.last_public);
        let player_changed = match &player_state {
            Some(ps) => changed(ps, &mut self.last_player),
            None => false,
        };
        let outcome_changed = changed(&record.outcome, &mut self.last_outcome);

        if !public_changed && !player_changed && !outcome_changed {
            return None;
        }

        Some(GameOutbound::UpdateGameState {
            public_state: public_changed.then_some(public_state),
            player_state: player_changed.then(|| player_state).flatten(),
            outcome: outcome_changed.then(|| record.outcome.clone()).flatten(),
        })
    }
}

fn changed<T: serde::Serialize>(value: &T, cached: &mut Option<serde_json::Value>) -> bool {
    let encoded = serde_json::to_value(value).expect("serializable");
    if cached.as_ref() == Some(&encoded) {
        false
    } else {
        *cached = Some(encoded);
        true
    }
}

impl<G: Game> Drop for GameConnection<G> {
    fn drop(&mut self) {
        self.hub.release(&self.game_id);
    }
}
