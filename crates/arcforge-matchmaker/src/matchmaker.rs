//! Matchmaking operations (spec.md §4.2): queues graduate on their own
//! once full, rooms graduate on an explicit `CommitRoom`. Both paths
//! share one shape — read the current state, compute the next state and
//! any resulting game, commit atomically, retry on conflict — which is
//! why every public function here is a plain loop over
//! [`Store::commit`] rather than a method on some `Matchmaker` actor:
//! there is no in-process state to own, only Store records.

use arcforge_game::{ActiveGameEntry, ActiveGames, Game, GameRecord, QueueDef};
use arcforge_protocol::{EntryId, GameId, Player, QueueId, RoomId, UserId};
use arcforge_session::User;
use arcforge_store::{
    active_games_key, assignment_key, game_key, queue_entry_key, queue_prefix, room_key,
    room_list_trigger_key, user_key, CommitRequest, IdGenerator, Mutation, Precondition, Store,
    StoreError,
};

use crate::assignment::Assignment;
use crate::error::MatchmakerError;
use crate::queue::QueueEntry;
use crate::room::{Room, RoomMember};

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, MatchmakerError> {
    Ok(serde_json::to_vec(value).map_err(StoreError::Encode)?)
}

/// Reads a user together with its versionstamp — `arcforge_session`'s
/// `get_user` drops the version, but every caller here needs it to build
/// a precondition.
async fn get_user_with_version(
    store: &Store,
    user_id: &UserId,
) -> Result<Option<(User, arcforge_store::Versionstamp)>, MatchmakerError> {
    Ok(store.get::<User>(&user_key(user_id.as_str())).await?)
}

// ---------------------------------------------------------------------------
// Queues
// ---------------------------------------------------------------------------

/// Joins `user_id` to `queue`'s waiting list under `entry_id` (minted by
/// the caller — the Hub layer, per spec.md §4.4), then attempts
/// graduation. No-ops are not possible here: a missing user is an error,
/// since a connection can only reach this call already authenticated.
pub async fn add_to_queue<G: Game>(
    store: &Store,
    id_gen: &IdGenerator,
    queue: &QueueDef<G::Config>,
    entry_id: EntryId,
    user_id: UserId,
    player: Player,
    loadout: G::Loadout,
    now_ms: u64,
) -> Result<Option<GameId>, MatchmakerError> {
    loop {
        let (user, version) = get_user_with_version(store, &user_id)
            .await?
            .ok_or_else(|| MatchmakerError::UserNotFound(user_id.clone()))?;

        let entry = QueueEntry {
            entry_id: entry_id.clone(),
            created_at_ms: now_ms,
            user_id: user_id.clone(),
            player: player.clone(),
            loadout: loadout.clone(),
        };
        let mut updated_user = user;
        updated_user.add_queue_entry(queue.queue_id.clone(), entry_id.clone());

        let request = CommitRequest::new()
            .require(Precondition::version(user_key(user_id.as_str()), version))
            .write(Mutation::Put(
                user_key(user_id.as_str()),
                encode(&updated_user)?,
            ))
            .require(Precondition::absent(queue_entry_key(
                queue.queue_id.as_str(),
                entry_id.as_str(),
            )))
            .write(Mutation::Put(
                queue_entry_key(queue.queue_id.as_str(), entry_id.as_str()),
                encode(&entry)?,
            ));

        match store.commit(request).await {
            Ok(_) => break,
            Err(StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }

    maybe_graduate_queue::<G>(store, id_gen, queue, now_ms).await
}

/// Removes `entry_id` from `queue_id` and from `user_id`'s
/// `queue_entries`. No-op if the entry is already gone (spec.md §7:
/// "leave on absent entry" is a silent no-op) — covers both explicit
/// leave and disconnect-triggered cleanup (spec.md §5).
pub async fn remove_from_queue(
    store: &Store,
    queue_id: &QueueId,
    entry_id: &EntryId,
    user_id: &UserId,
) -> Result<(), MatchmakerError> {
    loop {
        let key = queue_entry_key(queue_id.as_str(), entry_id.as_str());
        let Some((_, entry_version)) = store.get_raw(&key).await else {
            return Ok(());
        };

        let Some((user, user_version)) = get_user_with_version(store, user_id).await? else {
            // Dangling reference: still remove the orphaned entry.
            let result = store
                .commit(
                    CommitRequest::new()
                        .require(Precondition::version(key.clone(), entry_version))
                        .write(Mutation::Delete(key)),
                )
                .await;
            return match result {
                Ok(_) | Err(StoreError::Conflict(_)) => Ok(()),
                Err(other) => Err(other.into()),
            };
        };

        let mut updated_user = user;
        updated_user.remove_queue_entry(queue_id, entry_id);

        let request = CommitRequest::new()
            .require(Precondition::version(key.clone(), entry_version))
            .write(Mutation::Delete(key))
            .require(Precondition::version(user_key(user_id.as_str()), user_version))
            .write(Mutation::Put(
                user_key(user_id.as_str()),
                encode(&updated_user)?,
            ));

        match store.commit(request).await {
            Ok(_) => return Ok(()),
            Err(StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

/// Graduation algorithm (spec.md §4.2): promotes the queue's first
/// `numPlayers` entries (in key order, which is creation order — see
/// `arcforge-store`'s `IdGenerator`) into a freshly created game, in one
/// atomic commit. Returns `Ok(None)` if the queue doesn't yet hold
/// enough entries — this is success, not an error.
pub async fn maybe_graduate_queue<G: Game>(
    store: &Store,
    id_gen: &IdGenerator,
    queue: &QueueDef<G::Config>,
    now_ms: u64,
) -> Result<Option<GameId>, MatchmakerError> {
    loop {
        let prefix = queue_prefix(queue.queue_id.as_str());
        let listed = store
            .list_by_prefix::<QueueEntry<G::Loadout>>(&prefix)
            .await?;

        if listed.len() < queue.num_players {
            return Ok(None);
        }
        let graduating = &listed[..queue.num_players];

        let loadouts: Vec<G::Loadout> = graduating.iter().map(|(_, e, _)| e.loadout.clone()).collect();
        let players: Vec<Player> = graduating.iter().map(|(_, e, _)| e.player.clone()).collect();
        let user_ids: Vec<UserId> = graduating.iter().map(|(_, e, _)| e.user_id.clone()).collect();

        let mut users = Vec::with_capacity(user_ids.len());
        for user_id in &user_ids {
            let resolved = get_user_with_version(store, user_id)
                .await?
                .ok_or_else(|| MatchmakerError::UserNotFound(user_id.clone()))?;
            users.push(resolved);
        }

        let game_id = GameId::new(id_gen.generate());
        let (mut active, active_precondition) = store
            .get_singleton_or_default::<ActiveGames<G>>(&active_games_key())
            .await?;

        let game_state = G::setup(&queue.config, queue.num_players, &loadouts, now_ms);
        let record = GameRecord::<G> {
            game_id: game_id.clone(),
            config: queue.config.clone(),
            game_state,
            user_ids: user_ids.clone(),
            players: players.clone(),
            outcome: None,
        };
        active.push(ActiveGameEntry {
            game_id: game_id.clone(),
            players,
            config: queue.config.clone(),
            created_at_ms: now_ms,
        });

        let mut request = CommitRequest::new()
            .require(active_precondition)
            .write(Mutation::Put(active_games_key(), encode(&active)?))
            .require(Precondition::absent(game_key(game_id.as_str())))
            .write(Mutation::Put(game_key(game_id.as_str()), encode(&record)?));

        for (key, entry, version) in graduating {
            request = request
                .require(Precondition::version(key.clone(), *version))
                .write(Mutation::Delete(key.clone()))
                .require(Precondition::absent(assignment_key(entry.entry_id.as_str())))
                .write(Mutation::Put(
                    assignment_key(entry.entry_id.as_str()),
                    encode(&Assignment {
                        game_id: game_id.clone(),
                    })?,
                ));
        }

        for ((_, entry, _), (user, user_version)) in graduating.iter().zip(users.iter()) {
            let mut updated = user.clone();
            updated.remove_queue_entry(&queue.queue_id, &entry.entry_id);
            updated.add_active_game(game_id.clone());
            request = request
                .require(Precondition::version(
                    user_key(entry.user_id.as_str()),
                    *user_version,
                ))
                .write(Mutation::Put(
                    user_key(entry.user_id.as_str()),
                    encode(&updated)?,
                ));
        }

        match store.commit(request).await {
            Ok(_) => {
                tracing::info!(%game_id, queue_id = %queue.queue_id, "queue graduated");
                return Ok(Some(game_id));
            }
            Err(StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

fn bump_room_list_trigger(request: CommitRequest, now_ms: u64) -> Result<CommitRequest, MatchmakerError> {
    Ok(request.write(Mutation::Put(room_list_trigger_key(), encode(&now_ms)?)))
}

/// Creates an empty room. Fails if `room_id` already exists.
pub async fn create_room<G: Game>(
    store: &Store,
    room_id: RoomId,
    num_players: usize,
    config: G::Config,
    private: bool,
    now_ms: u64,
) -> Result<(), MatchmakerError> {
    let room = Room::<G::Config, G::Loadout> {
        room_id: room_id.clone(),
        num_players,
        config,
        private,
        members: Vec::new(),
    };

    let request = CommitRequest::new()
        .require(Precondition::absent(room_key(room_id.as_str())))
        .write(Mutation::Put(room_key(room_id.as_str()), encode(&room)?));
    let request = bump_room_list_trigger(request, now_ms)?;

    match store.commit(request).await {
        Ok(_) => Ok(()),
        Err(StoreError::Conflict(_)) => Err(MatchmakerError::RoomAlreadyExists(room_id)),
        Err(other) => Err(other.into()),
    }
}

/// Adds `user_id` as a member of `room_id`. Fails if the room is absent
/// or already full.
pub async fn add_to_room<G: Game>(
    store: &Store,
    room_id: &RoomId,
    entry_id: EntryId,
    user_id: UserId,
    player: Player,
    loadout: G::Loadout,
    now_ms: u64,
) -> Result<(), MatchmakerError> {
    loop {
        let (room, room_version) = store
            .get::<Room<G::Config, G::Loadout>>(&room_key(room_id.as_str()))
            .await?
            .ok_or_else(|| MatchmakerError::RoomNotFound(room_id.clone()))?;

        if room.is_full() {
            return Err(MatchmakerError::RoomFull(room_id.clone()));
        }

        let (user, user_version) = get_user_with_version(store, &user_id)
            .await?
            .ok_or_else(|| MatchmakerError::UserNotFound(user_id.clone()))?;

        let mut updated_room = room;
        updated_room.members.push(RoomMember {
            entry_id: entry_id.clone(),
            created_at_ms: now_ms,
            user_id: user_id.clone(),
            player,
            loadout,
        });

        let mut updated_user = user;
        updated_user.add_room_entry(room_id.clone(), entry_id.clone());

        let request = CommitRequest::new()
            .require(Precondition::version(room_key(room_id.as_str()), room_version))
            .write(Mutation::Put(room_key(room_id.as_str()), encode(&updated_room)?))
            .require(Precondition::version(user_key(user_id.as_str()), user_version))
            .write(Mutation::Put(
                user_key(user_id.as_str()),
                encode(&updated_user)?,
            ));
        let request = bump_room_list_trigger(request, now_ms)?;

        match store.commit(request).await {
            Ok(_) => return Ok(()),
            Err(StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

/// Removes `entry_id` from `room_id`. Deletes the room if it becomes
/// empty. No-op if the room or the member entry is already gone.
pub async fn remove_from_room<G: Game>(
    store: &Store,
    room_id: &RoomId,
    entry_id: &EntryId,
    now_ms: u64,
) -> Result<(), MatchmakerError> {
    loop {
        let Some((room, room_version)) = store
            .get::<Room<G::Config, G::Loadout>>(&room_key(room_id.as_str()))
            .await?
        else {
            return Ok(());
        };

        let Some(member) = room.members.iter().find(|m| &m.entry_id == entry_id).cloned() else {
            return Ok(());
        };

        let mut updated_room = room;
        updated_room.members.retain(|m| &m.entry_id != entry_id);

        let (user, user_version) = match get_user_with_version(store, &member.user_id).await? {
            Some(resolved) => resolved,
            None => {
                // Dangling reference: still remove the member from the room.
                let request = commit_room_membership_change(
                    room_id,
                    room_version,
                    &updated_room,
                    now_ms,
                )?;
                return match store.commit(request).await {
                    Ok(_) | Err(StoreError::Conflict(_)) => Ok(()),
                    Err(other) => Err(other.into()),
                };
            }
        };

        let mut updated_user = user;
        updated_user.remove_room_entry(room_id, entry_id);

        let mut request = commit_room_membership_change(room_id, room_version, &updated_room, now_ms)?;
        request = request
            .require(Precondition::version(
                user_key(member.user_id.as_str()),
                user_version,
            ))
            .write(Mutation::Put(
                user_key(member.user_id.as_str()),
                encode(&updated_user)?,
            ));

        match store.commit(request).await {
            Ok(_) => return Ok(()),
            Err(StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

fn commit_room_membership_change<C, L>(
    room_id: &RoomId,
    room_version: arcforge_store::Versionstamp,
    updated_room: &Room<C, L>,
    now_ms: u64,
) -> Result<CommitRequest, MatchmakerError>
where
    C: serde::Serialize,
    L: serde::Serialize,
{
    let request = CommitRequest::new().require(Precondition::version(
        room_key(room_id.as_str()),
        room_version,
    ));
    let request = if updated_room.members.is_empty() {
        request.write(Mutation::Delete(room_key(room_id.as_str())))
    } else {
        request.write(Mutation::Put(room_key(room_id.as_str()), encode(updated_room)?))
    };
    bump_room_list_trigger(request, now_ms)
}

/// Promotes every current member of `room_id` into a freshly created
/// game. Fails if the room has fewer than `numPlayers` members (spec.md
/// §4.2 "fails loudly if members < numPlayers").
pub async fn commit_room<G: Game>(
    store: &Store,
    id_gen: &IdGenerator,
    room_id: &RoomId,
    now_ms: u64,
) -> Result<GameId, MatchmakerError> {
    loop {
        let (room, room_version) = store
            .get::<Room<G::Config, G::Loadout>>(&room_key(room_id.as_str()))
            .await?
            .ok_or_else(|| MatchmakerError::RoomNotFound(room_id.clone()))?;

        if room.members.len() < room.num_players {
            return Err(MatchmakerError::RoomUnderfull {
                room_id: room_id.clone(),
                have: room.members.len(),
                need: room.num_players,
            });
        }

        let loadouts: Vec<G::Loadout> = room.members.iter().map(|m| m.loadout.clone()).collect();
        let players: Vec<Player> = room.members.iter().map(|m| m.player.clone()).collect();
        let user_ids: Vec<UserId> = room.members.iter().map(|m| m.user_id.clone()).collect();

        let mut users: Vec<(User, arcforge_store::Versionstamp)> = Vec::with_capacity(user_ids.len());
        for user_id in &user_ids {
            let resolved = get_user_with_version(store, user_id)
                .await?
                .ok_or_else(|| MatchmakerError::UserNotFound(user_id.clone()))?;
            users.push(resolved);
        }

        let game_id = GameId::new(id_gen.generate());
        let (mut active, active_precondition) = store
            .get_singleton_or_default::<ActiveGames<G>>(&active_games_key())
            .await?;

        let game_state = G::setup(&room.config, room.num_players, &loadouts, now_ms);
        let record = GameRecord::<G> {
            game_id: game_id.clone(),
            config: room.config.clone(),
            game_state,
            user_ids: user_ids.clone(),
            players: players.clone(),
            outcome: None,
        };
        active.push(ActiveGameEntry {
            game_id: game_id.clone(),
            players,
            config: room.config.clone(),
            created_at_ms: now_ms,
        });

        let mut request = CommitRequest::new()
            .require(active_precondition)
            .write(Mutation::Put(active_games_key(), encode(&active)?))
            .require(Precondition::absent(game_key(game_id.as_str())))
            .write(Mutation::Put(game_key(game_id.as_str()), encode(&record)?))
            .require(Precondition::version(room_key(room_id.as_str()), room_version))
            .write(Mutation::Delete(room_key(room_id.as_str())));
        request = bump_room_list_trigger(request, now_ms)?;

        for member in &room.members {
            request = request
                .require(Precondition::absent(assignment_key(member.entry_id.as_str())))
                .write(Mutation::Put(
                    assignment_key(member.entry_id.as_str()),
                    encode(&Assignment {
                        game_id: game_id.clone(),
                    })?,
                ));
        }

        for (member, (user, user_version)) in room.members.iter().zip(users.iter()) {
            let mut updated = user.clone();
            updated.remove_room_entry(room_id, &member.entry_id);
            updated.add_active_game(game_id.clone());
            request = request
                .require(Precondition::version(
                    user_key(member.user_id.as_str()),
                    *user_version,
                ))
                .write(Mutation::Put(
                    user_key(member.user_id.as_str()),
                    encode(&updated)?,
                ));
        }

        match store.commit(request).await {
            Ok(_) => {
                tracing::info!(%game_id, %room_id, "room committed");
                return Ok(game_id);
            }
            Err(StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcforge_game::{MoveContext, OutcomeContext, ProjectionContext};
    use arcforge_store::IdGenerator;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Config;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct State {
        seats: usize,
    }
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Move;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Loadout;
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Outcome;

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
        fn setup(_c: &Self::Config, n: usize, _l: &[Self::Loadout], _t: u64) -> Self::State {
            State { seats: n }
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
    }

    async fn seed_user(store: &Store, id_gen: &IdGenerator, name: &str) -> UserId {
        let user = User::new(
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

    fn queue() -> QueueDef<Config> {
        TestGame::queues().remove(0)
    }

    #[tokio::test]
    async fn test_two_entries_graduate_queue() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = seed_user(&store, &id_gen, "alice").await;
        let u2 = seed_user(&store, &id_gen, "bob").await;
        let q = queue();

        let first = add_to_queue::<TestGame>(
            &store,
            &id_gen,
            &q,
            EntryId::new("e1"),
            u1.clone(),
            Player { username: "alice".into(), is_guest: false },
            Loadout,
            0,
        )
        .await
        .unwrap();
        assert!(first.is_none());

        let second = add_to_queue::<TestGame>(
            &store,
            &id_gen,
            &q,
            EntryId::new("e2"),
            u2.clone(),
            Player { username: "bob".into(), is_guest: false },
            Loadout,
            0,
        )
        .await
        .unwrap();
        let game_id = second.expect("queue should graduate once full");

        let (record, _) = arcforge_game::read_game::<TestGame>(&store, &game_id)
            .await
            .unwrap();
        assert_eq!(record.user_ids, vec![u1.clone(), u2.clone()]);
        assert_eq!(record.game_state.seats, 2);

        assert!(store
            .get_raw(&queue_entry_key("q", "e1"))
            .await
            .is_none());
        assert!(store
            .get_raw(&queue_entry_key("q", "e2"))
            .await
            .is_none());

        let (assignment1, _): (Assignment, _) = store
            .get(&assignment_key("e1"))
            .await
            .unwrap()
            .unwrap();
        let (assignment2, _): (Assignment, _) = store
            .get(&assignment_key("e2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment1.game_id, game_id);
        assert_eq!(assignment2.game_id, game_id);
    }

    #[tokio::test]
    async fn test_remove_from_queue_before_graduation_is_clean() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = seed_user(&store, &id_gen, "alice").await;
        let q = queue();

        add_to_queue::<TestGame>(
            &store,
            &id_gen,
            &q,
            EntryId::new("e1"),
            u1.clone(),
            Player { username: "alice".into(), is_guest: false },
            Loadout,
            0,
        )
        .await
        .unwrap();

        remove_from_queue(&store, &q.queue_id, &EntryId::new("e1"), &u1)
            .await
            .unwrap();

        assert!(store.get_raw(&queue_entry_key("q", "e1")).await.is_none());
        let user = arcforge_session::get_user(&store, &u1).await.unwrap().unwrap();
        assert!(user.queue_entries.is_empty());
    }

    #[tokio::test]
    async fn test_remove_from_queue_is_noop_when_absent() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = seed_user(&store, &id_gen, "alice").await;
        remove_from_queue(&store, &QueueId::new("q"), &EntryId::new("missing"), &u1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_commit_room_underfull_fails() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = seed_user(&store, &id_gen, "alice").await;
        let room_id = RoomId::new("r1");

        create_room::<TestGame>(&store, room_id.clone(), 2, Config, false, 0)
            .await
            .unwrap();
        add_to_room::<TestGame>(
            &store,
            &room_id,
            EntryId::new("e1"),
            u1,
            Player { username: "alice".into(), is_guest: false },
            Loadout,
            0,
        )
        .await
        .unwrap();

        let result = commit_room::<TestGame>(&store, &id_gen, &room_id, 0).await;
        assert!(matches!(
            result,
            Err(MatchmakerError::RoomUnderfull { have: 1, need: 2, .. })
        ));
        assert!(store.get_raw(&room_key("r1")).await.is_some());
    }

    #[tokio::test]
    async fn test_commit_room_graduates_all_members_in_order() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = seed_user(&store, &id_gen, "alice").await;
        let u2 = seed_user(&store, &id_gen, "bob").await;
        let room_id = RoomId::new("r1");

        create_room::<TestGame>(&store, room_id.clone(), 2, Config, false, 0)
            .await
            .unwrap();
        add_to_room::<TestGame>(
            &store,
            &room_id,
            EntryId::new("e1"),
            u1.clone(),
            Player { username: "alice".into(), is_guest: false },
            Loadout,
            0,
        )
        .await
        .unwrap();
        add_to_room::<TestGame>(
            &store,
            &room_id,
            EntryId::new("e2"),
            u2.clone(),
            Player { username: "bob".into(), is_guest: false },
            Loadout,
            0,
        )
        .await
        .unwrap();

        let game_id = commit_room::<TestGame>(&store, &id_gen, &room_id, 0)
            .await
            .unwrap();

        let (record, _) = arcforge_game::read_game::<TestGame>(&store, &game_id)
            .await
            .unwrap();
        assert_eq!(record.user_ids, vec![u1, u2]);
        assert!(store.get_raw(&room_key("r1")).await.is_none());
    }

    #[tokio::test]
    async fn test_room_full_rejects_extra_member() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = seed_user(&store, &id_gen, "alice").await;
        let u2 = seed_user(&store, &id_gen, "bob").await;
        let u3 = seed_user(&store, &id_gen, "carol").await;
        let room_id = RoomId::new("r1");

        create_room::<TestGame>(&store, room_id.clone(), 2, Config, false, 0)
            .await
            .unwrap();
        for (entry, uid) in [("e1", &u1), ("e2", &u2)] {
            add_to_room::<TestGame>(
                &store,
                &room_id,
                EntryId::new(entry),
                uid.clone(),
                Player { username: entry.into(), is_guest: false },
                Loadout,
                0,
            )
            .await
            .unwrap();
        }

        let result = add_to_room::<TestGame>(
            &store,
            &room_id,
            EntryId::new("e3"),
            u3,
            Player { username: "carol".into(), is_guest: false },
            Loadout,
            0,
        )
        .await;
        assert!(matches!(result, Err(MatchmakerError::RoomFull(_))));
    }

    #[tokio::test]
    async fn test_remove_last_member_deletes_room() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = seed_user(&store, &id_gen, "alice").await;
        let room_id = RoomId::new("r1");

        create_room::<TestGame>(&store, room_id.clone(), 2, Config, false, 0)
            .await
            .unwrap();
        add_to_room::<TestGame>(
            &store,
            &room_id,
            EntryId::new("e1"),
            u1,
            Player { username: "alice".into(), is_guest: false },
            Loadout,
            0,
        )
        .await
        .unwrap();

        remove_from_room::<TestGame>(&store, &room_id, &EntryId::new("e1"), 0)
            .await
            .unwrap();

        assert!(store.get_raw(&room_key("r1")).await.is_none());
    }

    #[tokio::test]
    async fn test_create_room_rejects_duplicate_id() {
        let store = Store::new();
        let room_id = RoomId::new("r1");
        create_room::<TestGame>(&store, room_id.clone(), 2, Config, false, 0)
            .await
            .unwrap();
        let result = create_room::<TestGame>(&store, room_id, 2, Config, false, 0).await;
        assert!(matches!(result, Err(MatchmakerError::RoomAlreadyExists(_))));
    }
}
