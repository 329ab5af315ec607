//! Lobby-wide fan-out (spec.md §4.4): one `LobbyHub<G>` per deployed
//! game type, shared by every lobby connection. A single background
//! driver task watches `ActiveGames` and the room-list trigger key and
//! rebroadcasts "something changed" to every connection; each connection
//! then decides for itself whether that's actually news by recomputing
//! and diffing its own projection. This is the teacher's
//! `RoomActor`/`RoomHandle` single-writer-per-entity shape, generalized
//! from one room to the whole lobby: no connection ever locks another
//! connection's state, and nothing holds the store's internal lock
//! across a suspension point.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arcforge_game::{ActiveGameEntry, ActiveGames, Game};
use arcforge_matchmaker::{self as matchmaker, Room};
use arcforge_protocol::{EntryId, GameId, Player, QueueId, RoomId, UserId};
use arcforge_store::{
    active_games_key, assignment_key, room_list_trigger_key, room_prefix, user_key, IdGenerator,
    Store, WatchHandle,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::HubError;
use crate::messages::{LobbyInbound, LobbyOutbound, LobbyPropsDelta, RoomSummary};

const BROADCAST_CAPACITY: usize = 1024;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy)]
enum GlobalChange {
    ActiveGames,
    AvailableRooms,
}

/// Shared lobby-wide state for one `Game` type: the store handle, id
/// generator, and the driver watching the keys every connection's
/// "available rooms"/"active games" view derives from. Cheap to clone —
/// every clone shares the same driver task.
pub struct LobbyHub<G: Game> {
    store: Store,
    id_gen: Arc<IdGenerator>,
    changes: broadcast::Sender<GlobalChange>,
    _driver: Arc<JoinHandle<()>>,
    _marker: PhantomData<fn() -> G>,
}

impl<G: Game> Clone for LobbyHub<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            id_gen: Arc::clone(&self.id_gen),
            changes: self.changes.clone(),
            _driver: Arc::clone(&self._driver),
            _marker: PhantomData,
        }
    }
}

impl<G: Game> LobbyHub<G> {
    pub fn new(store: Store, id_gen: Arc<IdGenerator>) -> Self {
        let (changes, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        let driver = tokio::spawn(run_driver(store.clone(), changes.clone()));
        Self {
            store,
            id_gen,
            changes,
            _driver: Arc::new(driver),
            _marker: PhantomData,
        }
    }

    /// Opens a connection on behalf of `user_id`, seeding its diff cache
    /// with that user's current matchmaking state so the first genuine
    /// change is the first thing sent (spec.md §4.4).
    pub async fn connect(&self, user_id: UserId) -> Result<LobbyConnection<G>, HubError> {
        let user = arcforge_session::get_user(&self.store, &user_id)
            .await?
            .ok_or_else(|| HubError::UserNotFound(user_id.clone()))?;
        let user_watch = self.store.watch(vec![user_key(user_id.as_str())]);

        let cache = LobbyCache {
            player: Some(serde_json::to_value(&user.player).expect("serializable")),
            user_active_games: Some(
                serde_json::to_value(&user.active_games).expect("serializable"),
            ),
            room_entries: Some(serde_json::to_value(&user.room_entries).expect("serializable")),
            queue_entries: Some(
                serde_json::to_value(&user.queue_entries).expect("serializable"),
            ),
            ..LobbyCache::default()
        };

        let (assignment_tx, assignment_rx) = mpsc::unbounded_channel();

        Ok(LobbyConnection {
            store: self.store.clone(),
            id_gen: Arc::clone(&self.id_gen),
            user_id,
            changes: self.changes.subscribe(),
            user_watch,
            entries: Vec::new(),
            assignment_tx,
            assignment_rx,
            cache,
        })
    }
}

async fn run_driver(store: Store, changes: broadcast::Sender<GlobalChange>) {
    let mut active = store.watch(vec![active_games_key()]);
    let mut rooms = store.watch(vec![room_list_trigger_key()]);
    loop {
        tokio::select! {
            res = active.next() => {
                if res.is_err() {
                    return;
                }
                let _ = changes.send(GlobalChange::ActiveGames);
            }
            res = rooms.next() => {
                if res.is_err() {
                    return;
                }
                let _ = changes.send(GlobalChange::AvailableRooms);
            }
        }
    }
}

#[derive(Default)]
struct LobbyCache {
    active_games: Option<serde_json::Value>,
    available_rooms: Option<serde_json::Value>,
    user_active_games: Option<serde_json::Value>,
    player: Option<serde_json::Value>,
    room_entries: Option<serde_json::Value>,
    queue_entries: Option<serde_json::Value>,
}

/// Compares `value`'s canonical JSON against the cache, updating it in
/// place. `true` if this is the first time we've seen this value.
fn changed<T: serde::Serialize>(value: &T, cached: &mut Option<serde_json::Value>) -> bool {
    let encoded = serde_json::to_value(value).expect("serializable");
    if cached.as_ref() == Some(&encoded) {
        false
    } else {
        *cached = Some(encoded);
        true
    }
}

enum EntryKind {
    Queue(QueueId),
    Room(RoomId),
}

struct MatchmakingEntry {
    kind: EntryKind,
    entry_id: EntryId,
    watcher: JoinHandle<()>,
}

/// One lobby connection's live state: which queues/rooms it's currently
/// waiting in, its diff cache, and the channels that feed it changes.
pub struct LobbyConnection<G: Game> {
    store: Store,
    id_gen: Arc<IdGenerator>,
    user_id: UserId,
    changes: broadcast::Receiver<GlobalChange>,
    user_watch: WatchHandle,
    entries: Vec<MatchmakingEntry>,
    assignment_tx: mpsc::UnboundedSender<GameId>,
    assignment_rx: mpsc::UnboundedReceiver<GameId>,
    cache: LobbyCache,
}

impl<G: Game> LobbyConnection<G> {
    /// Handles one inbound message. Failures are reported as
    /// `DisplayError`, never as an `Err` the caller has to route —
    /// spec.md §7 treats every lobby-message failure as recoverable.
    pub async fn handle_inbound(&mut self, msg: LobbyInbound<G>) -> Vec<LobbyOutbound<G>> {
        match msg {
            LobbyInbound::Initialize {
                active_games,
                available_rooms,
            } => {
                self.cache.active_games =
                    Some(serde_json::to_value(&active_games).expect("serializable"));
                self.cache.available_rooms =
                    Some(serde_json::to_value(&available_rooms).expect("serializable"));
                // Correct any divergence between the client's asserted
                // baseline and reality exactly once (spec.md §4.4) — the
                // next genuine change may be arbitrarily far in the
                // future, and a stale client shouldn't have to wait for it.
                let mut delta = LobbyPropsDelta::default();
                if let Some(d) = self.diff_all_global().await {
                    delta = d;
                }
                if let Some(d) = self.diff_user().await {
                    delta.user_active_games = delta.user_active_games.or(d.user_active_games);
                    delta.player = delta.player.or(d.player);
                    delta.room_entries = delta.room_entries.or(d.room_entries);
                    delta.queue_entries = delta.queue_entries.or(d.queue_entries);
                }
                if delta.is_empty() {
                    Vec::new()
                } else {
                    vec![LobbyOutbound::UpdateLobbyProps { props: delta }]
                }
            }
            LobbyInbound::JoinQueue { queue_id, loadout } => {
                self.join_queue(queue_id, loadout).await
            }
            LobbyInbound::CreateAndJoinRoom {
                config,
                num_players,
                private,
                loadout,
            } => {
                self.create_and_join_room(config, num_players, private, loadout)
                    .await
            }
            LobbyInbound::JoinRoom { room_id, loadout } => self.join_room(room_id, loadout).await,
            LobbyInbound::CommitRoom { room_id } => self.commit_room(room_id).await,
            LobbyInbound::LeaveMatchmaking => {
                self.leave_matchmaking().await;
                Vec::new()
            }
            LobbyInbound::UpdateUsername { username } => {
                if let Err(e) =
                    arcforge_session::rename_user(&self.store, &self.user_id, &username).await
                {
                    return vec![LobbyOutbound::DisplayError {
                        message: e.to_string(),
                    }];
                }
                Vec::new()
            }
        }
    }

    /// Waits for the next genuinely new thing to tell this connection.
    /// `None` once the store has shut down underneath it.
    pub async fn next_update(&mut self) -> Option<LobbyOutbound<G>> {
        loop {
            tokio::select! {
                change = self.changes.recv() => {
                    match change {
                        Ok(GlobalChange::ActiveGames) => {
                            if let Some(delta) = self.diff_active_games().await {
                                return Some(LobbyOutbound::UpdateLobbyProps { props: delta });
                            }
                        }
                        Ok(GlobalChange::AvailableRooms) => {
                            if let Some(delta) = self.diff_available_rooms().await {
                                return Some(LobbyOutbound::UpdateLobbyProps { props: delta });
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "lobby connection lagged behind global changes");
                            if let Some(delta) = self.diff_all_global().await {
                                return Some(LobbyOutbound::UpdateLobbyProps { props: delta });
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
                res = self.user_watch.next() => {
                    if res.is_err() {
                        return None;
                    }
                    if let Some(delta) = self.diff_user().await {
                        return Some(LobbyOutbound::UpdateLobbyProps { props: delta });
                    }
                }
                Some(game_id) = self.assignment_rx.recv() => {
                    return Some(LobbyOutbound::GameAssignment { game_id });
                }
            }
        }
    }

    async fn current_active_games(&self) -> Vec<ActiveGameEntry<G>> {
        match self
            .store
            .get::<ActiveGames<G>>(&active_games_key())
            .await
            .ok()
            .flatten()
        {
            Some((active, _)) => active.entries,
            None => Vec::new(),
        }
    }

    async fn current_available_rooms(&self) -> Vec<RoomSummary<G::Config>> {
        let listed = self
            .store
            .list_by_prefix::<Room<G::Config, G::Loadout>>(&room_prefix())
            .await
            .unwrap_or_default();
        listed
            .into_iter()
            .filter(|(_, room, _)| !room.private)
            .map(|(_, room, _)| RoomSummary {
                room_id: room.room_id,
                num_players: room.num_players,
                config: room.config,
                players: room.members.into_iter().map(|m| m.player).collect(),
            })
            .collect()
    }

    async fn diff_active_games(&mut self) -> Option<LobbyPropsDelta<G>> {
        let active = self.current_active_games().await;
        if changed(&active, &mut self.cache.active_games) {
            Some(LobbyPropsDelta {
                all_active_games: Some(active),
                ..LobbyPropsDelta::default()
            })
        } else {
            None
        }
    }

    async fn diff_available_rooms(&mut self) -> Option<LobbyPropsDelta<G>> {
        let rooms = self.current_available_rooms().await;
        if changed(&rooms, &mut self.cache.available_rooms) {
            Some(LobbyPropsDelta {
                all_available_rooms: Some(rooms),
                ..LobbyPropsDelta::default()
            })
        } else {
            None
        }
    }

    async fn diff_all_global(&mut self) -> Option<LobbyPropsDelta<G>> {
        let mut delta = LobbyPropsDelta::default();
        let active = self.current_active_games().await;
        if changed(&active, &mut self.cache.active_games) {
            delta.all_active_games = Some(active);
        }
        let rooms = self.current_available_rooms().await;
        if changed(&rooms, &mut self.cache.available_rooms) {
            delta.all_available_rooms = Some(rooms);
        }
        (!delta.is_empty()).then_some(delta)
    }

    async fn diff_user(&mut self) -> Option<LobbyPropsDelta<G>> {
        let user = arcforge_session::get_user(&self.store, &self.user_id)
            .await
            .ok()??;
        let mut delta = LobbyPropsDelta::default();
        if changed(&user.active_games, &mut self.cache.user_active_games) {
            delta.user_active_games = Some(user.active_games.clone());
        }
        if changed(&user.player, &mut self.cache.player) {
            delta.player = Some(user.player.clone());
        }
        if changed(&user.room_entries, &mut self.cache.room_entries) {
            delta.room_entries = Some(user.room_entries.clone());
        }
        if changed(&user.queue_entries, &mut self.cache.queue_entries) {
            delta.queue_entries = Some(user.queue_entries.clone());
        }
        (!delta.is_empty()).then_some(delta)
    }

    async fn current_player(&self) -> Result<Player, HubError> {
        arcforge_session::get_user(&self.store, &self.user_id)
            .await?
            .map(|u| u.player)
            .ok_or_else(|| HubError::UserNotFound(self.user_id.clone()))
    }

    /// Subscribes to `entryId`'s assignment key before the caller does
    /// anything that might graduate it — a watch established after the
    /// write would miss a notification the broadcast channel never
    /// replays.
    fn spawn_assignment_watcher(&mut self, kind: EntryKind, entry_id: EntryId) {
        let store = self.store.clone();
        let tx = self.assignment_tx.clone();
        let watched_key = assignment_key(entry_id.as_str());
        let handle = tokio::spawn(async move {
            let mut watch = store.watch(vec![watched_key]);
            loop {
                match watch.next().await {
                    Ok(snapshot) => {
                        let Some((bytes, _)) = &snapshot[0] else {
                            continue;
                        };
                        if let Ok(assignment) =
                            serde_json::from_slice::<matchmaker::Assignment>(bytes)
                        {
                            let _ = tx.send(assignment.game_id);
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
        });
        self.entries.push(MatchmakingEntry {
            kind,
            entry_id,
            watcher: handle,
        });
    }

    fn cancel_entry(&mut self, entry_id: &EntryId) {
        if let Some(pos) = self.entries.iter().position(|e| &e.entry_id == entry_id) {
            let entry = self.entries.remove(pos);
            entry.watcher.abort();
        }
    }

    async fn join_queue(
        &mut self,
        queue_id: QueueId,
        loadout: G::Loadout,
    ) -> Vec<LobbyOutbound<G>> {
        let Some(queue) = G::queues().into_iter().find(|q| q.queue_id == queue_id) else {
            return vec![LobbyOutbound::DisplayError {
                message: format!("no such queue: {queue_id}"),
            }];
        };
        if !G::is_valid_loadout(&loadout) {
            return vec![LobbyOutbound::DisplayError {
                message: "invalid loadout".to_string(),
            }];
        }
        let player = match self.current_player().await {
            Ok(p) => p,
            Err(e) => {
                return vec![LobbyOutbound::DisplayError {
                    message: e.to_string(),
                }]
            }
        };

        let entry_id = EntryId::new(self.id_gen.generate());
        self.spawn_assignment_watcher(EntryKind::Queue(queue_id), entry_id.clone());

        let result = matchmaker::add_to_queue::<G>(
            &self.store,
            &self.id_gen,
            &queue,
            entry_id.clone(),
            self.user_id.clone(),
            player,
            loadout,
            now_ms(),
        )
        .await;

        if let Err(e) = result {
            self.cancel_entry(&entry_id);
            return vec![LobbyOutbound::DisplayError {
                message: e.to_string(),
            }];
        }
        Vec::new()
    }

    async fn create_and_join_room(
        &mut self,
        config: G::Config,
        num_players: usize,
        private: bool,
        loadout: G::Loadout,
    ) -> Vec<LobbyOutbound<G>> {
        if !G::is_valid_room(&config, num_players) {
            return vec![LobbyOutbound::DisplayError {
                message: "invalid room configuration".to_string(),
            }];
        }
        if !G::is_valid_loadout(&loadout) {
            return vec![LobbyOutbound::DisplayError {
                message: "invalid loadout".to_string(),
            }];
        }

        let room_id = RoomId::new(self.id_gen.generate());
        if let Err(e) = matchmaker::create_room::<G>(
            &self.store,
            room_id.clone(),
            num_players,
            config,
            private,
            now_ms(),
        )
        .await
        {
            return vec![LobbyOutbound::DisplayError {
                message: e.to_string(),
            }];
        }

        self.join_room(room_id, loadout).await
    }

    async fn join_room(&mut self, room_id: RoomId, loadout: G::Loadout) -> Vec<LobbyOutbound<G>> {
        if !G::is_valid_loadout(&loadout) {
            return vec![LobbyOutbound::DisplayError {
                message: "invalid loadout".to_string(),
            }];
        }
        let player = match self.current_player().await {
            Ok(p) => p,
            Err(e) => {
                return vec![LobbyOutbound::DisplayError {
                    message: e.to_string(),
                }]
            }
        };

        let entry_id = EntryId::new(self.id_gen.generate());
        self.spawn_assignment_watcher(EntryKind::Room(room_id.clone()), entry_id.clone());

        let result = matchmaker::add_to_room::<G>(
            &self.store,
            &room_id,
            entry_id.clone(),
            self.user_id.clone(),
            player,
            loadout,
            now_ms(),
        )
        .await;

        if let Err(e) = result {
            self.cancel_entry(&entry_id);
            return vec![LobbyOutbound::DisplayError {
                message: e.to_string(),
            }];
        }
        Vec::new()
    }

    async fn commit_room(&mut self, room_id: RoomId) -> Vec<LobbyOutbound<G>> {
        match matchmaker::commit_room::<G>(&self.store, &self.id_gen, &room_id, now_ms()).await {
            Ok(_) => Vec::new(),
            Err(e) => vec![LobbyOutbound::DisplayError {
                message: e.to_string(),
            }],
        }
    }

    async fn leave_matchmaking(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            entry.watcher.abort();
            let result = match &entry.kind {
                EntryKind::Queue(queue_id) => {
                    matchmaker::remove_from_queue(
                        &self.store,
                        queue_id,
                        &entry.entry_id,
                        &self.user_id,
                    )
                    .await
                }
                EntryKind::Room(room_id) => {
                    matchmaker::remove_from_room::<G>(&self.store, room_id, &entry.entry_id, now_ms())
                        .await
                }
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to remove matchmaking entry on leave");
            }
        }
    }
}

impl<G: Game> Drop for LobbyConnection<G> {
    fn drop(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        for entry in &entries {
            entry.watcher.abort();
        }
        if entries.is_empty() {
            return;
        }
        // Leave-on-disconnect cleanup (spec.md §5): Drop can't await, so
        // this runs detached. Best-effort — if the process is exiting
        // too, the records are orphaned but harmless.
        let store = self.store.clone();
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            for entry in entries {
                let result = match entry.kind {
                    EntryKind::Queue(queue_id) => {
                        matchmaker::remove_from_queue(&store, &queue_id, &entry.entry_id, &user_id)
                            .await
                    }
                    EntryKind::Room(room_id) => {
                        matchmaker::remove_from_room::<G>(&store, &room_id, &entry.entry_id, now_ms())
                            .await
                    }
                };
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to clean up matchmaking entry on disconnect");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcforge_game::{MoveContext, OutcomeContext, ProjectionContext, QueueDef};
    use arcforge_store::IdGenerator as StoreIdGenerator;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Config;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct State;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Move;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Loadout {
        accepted: bool,
    }
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Outcome;

    #[derive(Debug)]
    struct TestGame;
    impl Game for TestGame {
        type Config = Config;
        type State = State;
        type Move = Move;
        type Loadout = Loadout;
        type PlayerState = State;
        type PublicState = State;
        type Outcome = Outcome;

        fn queues() -> Vec<QueueDef<Self::Config>> {
            vec![QueueDef {
                queue_id: QueueId::new("q"),
                num_players: 2,
                config: Config,
            }]
        }
        fn setup(_c: &Self::Config, _n: usize, _l: &[Self::Loadout], _t: u64) -> Self::State {
            State
        }
        fn is_valid_move(_s: &Self::State, _ctx: &MoveContext<Self>) -> bool {
            true
        }
        fn process_move(s: &Self::State, _ctx: &MoveContext<Self>) -> Self::State {
            s.clone()
        }
        fn outcome(_s: &Self::State, _ctx: &OutcomeContext<Self>) -> Option<Self::Outcome> {
            None
        }
        fn player_state(s: &Self::State, _ctx: &ProjectionContext<Self>) -> Self::PlayerState {
            s.clone()
        }
        fn public_state(s: &Self::State, _ctx: &ProjectionContext<Self>) -> Self::PublicState {
            s.clone()
        }
        fn is_valid_loadout(loadout: &Self::Loadout) -> bool {
            loadout.accepted
        }
    }

    async fn seed_user(store: &Store, id_gen: &StoreIdGenerator, name: &str) -> UserId {
        let user = arcforge_session::User::new(
            UserId::new(id_gen.generate()),
            Player {
                username: name.to_string(),
                is_guest: false,
            },
        );
        store
            .put(user_key(user.user_id.as_str()), &user)
            .await
            .unwrap();
        user.user_id
    }

    #[tokio::test]
    async fn test_initialize_with_accurate_baseline_emits_nothing() {
        let store = Store::new();
        let id_gen = Arc::new(StoreIdGenerator::new());
        let user_id = seed_user(&store, &id_gen, "alice").await;
        let hub: LobbyHub<TestGame> = LobbyHub::new(store, id_gen);
        let mut conn = hub.connect(user_id).await.unwrap();

        let replies = conn
            .handle_inbound(LobbyInbound::Initialize {
                active_games: Vec::new(),
                available_rooms: Vec::new(),
            })
            .await;
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_with_stale_baseline_corrects_immediately() {
        let store = Store::new();
        let id_gen = Arc::new(StoreIdGenerator::new());
        let user_id = seed_user(&store, &id_gen, "alice").await;
        let hub: LobbyHub<TestGame> = LobbyHub::new(store, id_gen);

        // A room exists before this connection ever calls Initialize.
        matchmaker::create_room::<TestGame>(&hub.store, RoomId::new("r1"), 2, Config, false, 0)
            .await
            .unwrap();

        let mut conn = hub.connect(user_id).await.unwrap();
        let replies = conn
            .handle_inbound(LobbyInbound::Initialize {
                active_games: Vec::new(),
                available_rooms: Vec::new(),
            })
            .await;

        match replies.as_slice() {
            [LobbyOutbound::UpdateLobbyProps { props }] => {
                assert_eq!(props.all_available_rooms.as_ref().unwrap().len(), 1);
            }
            other => panic!("expected a corrective UpdateLobbyProps, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_queue_rejects_invalid_loadout() {
        let store = Store::new();
        let id_gen = Arc::new(StoreIdGenerator::new());
        let user_id = seed_user(&store, &id_gen, "alice").await;
        let hub: LobbyHub<TestGame> = LobbyHub::new(store, id_gen);
        let mut conn = hub.connect(user_id).await.unwrap();

        let replies = conn
            .handle_inbound(LobbyInbound::JoinQueue {
                queue_id: QueueId::new("q"),
                loadout: Loadout { accepted: false },
            })
            .await;

        assert!(matches!(replies[0], LobbyOutbound::DisplayError { .. }));
        assert!(conn.entries.is_empty());
    }

    #[tokio::test]
    async fn test_join_queue_then_graduation_notifies_both_connections() {
        let store = Store::new();
        let id_gen = Arc::new(StoreIdGenerator::new());
        let alice = seed_user(&store, &id_gen, "alice").await;
        let bob = seed_user(&store, &id_gen, "bob").await;
        let hub: LobbyHub<TestGame> = LobbyHub::new(store, id_gen);

        let mut alice_conn = hub.connect(alice).await.unwrap();
        let mut bob_conn = hub.connect(bob).await.unwrap();

        let replies = alice_conn
            .handle_inbound(LobbyInbound::JoinQueue {
                queue_id: QueueId::new("q"),
                loadout: Loadout { accepted: true },
            })
            .await;
        assert!(replies.is_empty());

        let replies = bob_conn
            .handle_inbound(LobbyInbound::JoinQueue {
                queue_id: QueueId::new("q"),
                loadout: Loadout { accepted: true },
            })
            .await;
        assert!(replies.is_empty());

        let alice_update = alice_conn.next_update().await.unwrap();
        assert!(matches!(alice_update, LobbyOutbound::GameAssignment { .. }));
        let bob_update = bob_conn.next_update().await.unwrap();
        assert!(matches!(bob_update, LobbyOutbound::GameAssignment { .. }));
    }

    #[tokio::test]
    async fn test_leave_matchmaking_removes_queue_entry() {
        let store = Store::new();
        let id_gen = Arc::new(StoreIdGenerator::new());
        let alice = seed_user(&store, &id_gen, "alice").await;
        let hub: LobbyHub<TestGame> = LobbyHub::new(store.clone(), id_gen);
        let mut conn = hub.connect(alice.clone()).await.unwrap();

        conn.handle_inbound(LobbyInbound::JoinQueue {
            queue_id: QueueId::new("q"),
            loadout: Loadout { accepted: true },
        })
        .await;
        assert_eq!(conn.entries.len(), 1);

        conn.handle_inbound(LobbyInbound::LeaveMatchmaking).await;
        assert!(conn.entries.is_empty());

        let user = arcforge_session::get_user(&store, &alice).await.unwrap().unwrap();
        assert!(user.queue_entries.is_empty());
    }

    #[tokio::test]
    async fn test_room_flow_creates_joins_and_commits() {
        let store = Store::new();
        let id_gen = Arc::new(StoreIdGenerator::new());
        let alice = seed_user(&store, &id_gen, "alice").await;
        let bob = seed_user(&store, &id_gen, "bob").await;
        let hub: LobbyHub<TestGame> = LobbyHub::new(store, id_gen);

        let mut alice_conn = hub.connect(alice).await.unwrap();
        let mut bob_conn = hub.connect(bob).await.unwrap();

        let replies = alice_conn
            .handle_inbound(LobbyInbound::CreateAndJoinRoom {
                config: Config,
                num_players: 2,
                private: false,
                loadout: Loadout { accepted: true },
            })
            .await;
        assert!(replies.is_empty());
        assert_eq!(alice_conn.entries.len(), 1);
        let EntryKind::Room(room_id) = &alice_conn.entries[0].kind else {
            panic!("expected a room entry");
        };
        let room_id = room_id.clone();

        let replies = bob_conn
            .handle_inbound(LobbyInbound::JoinRoom {
                room_id: room_id.clone(),
                loadout: Loadout { accepted: true },
            })
            .await;
        assert!(replies.is_empty());

        let replies = alice_conn
            .handle_inbound(LobbyInbound::CommitRoom { room_id })
            .await;
        assert!(replies.is_empty());

        let alice_update = alice_conn.next_update().await.unwrap();
        assert!(matches!(alice_update, LobbyOutbound::GameAssignment { .. }));
        let bob_update = bob_conn.next_update().await.unwrap();
        assert!(matches!(bob_update, LobbyOutbound::GameAssignment { .. }));
    }

    #[tokio::test]
    async fn test_update_username_reflects_in_next_update() {
        let store = Store::new();
        let id_gen = Arc::new(StoreIdGenerator::new());
        let alice = seed_user(&store, &id_gen, "alice").await;
        let hub: LobbyHub<TestGame> = LobbyHub::new(store, id_gen);
        let mut conn = hub.connect(alice).await.unwrap();

        conn.handle_inbound(LobbyInbound::UpdateUsername {
            username: "alice2".to_string(),
        })
        .await;

        let update = conn.next_update().await.unwrap();
        match update {
            LobbyOutbound::UpdateLobbyProps { props } => {
                assert_eq!(props.player.unwrap().username, "alice2");
                assert!(props.all_active_games.is_none());
            }
            other => panic!("expected UpdateLobbyProps, got {other:?}"),
        }
    }
}
