//! The transactional key-value store.
//!
//! `Store` owns the entire keyspace behind a single async mutex — a
//! single-writer discipline, as recommended (not just permitted) by
//! spec.md §5. Cross-entity work must never hold this lock across a
//! suspension point other than the commit itself; every method here
//! acquires the lock, does its work, and releases it before returning.
//!
//! This is the one in-process implementation this crate ships. The spec
//! treats the KV store as an external collaborator specified only by its
//! operations and semantics (§1 "Out of scope"); a distributed backend
//! would be a separate crate exposing the same method surface, not a
//! trait object swapped in here — duck-typed like the teacher crate's own
//! concrete `SessionManager`/`RoomManager`, not an abstracted interface.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::commit::{CommitRequest, Expect, Mutation};
use crate::error::StoreError;
use crate::key::Key;
use crate::versionstamp::{VersionClock, Versionstamp};
use crate::watch::{KeyChanged, WatchHandle};

const CHANGE_CHANNEL_CAPACITY: usize = 4096;

struct Inner {
    data: Mutex<BTreeMap<Key, (Vec<u8>, Versionstamp)>>,
    clock: VersionClock,
    changes: broadcast::Sender<KeyChanged>,
}

/// A thin, cheaply-cloneable handle to the store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(BTreeMap::new()),
                clock: VersionClock::new(),
                changes,
            }),
        }
    }

    /// Raw `Get`: the value's bytes plus its versionstamp, or `None` if
    /// the key is absent.
    pub async fn get_raw(&self, key: &Key) -> Option<(Vec<u8>, Versionstamp)> {
        self.inner.data.lock().await.get(key).cloned()
    }

    /// Typed `Get`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &Key,
    ) -> Result<Option<(T, Versionstamp)>, StoreError> {
        match self.get_raw(key).await {
            None => Ok(None),
            Some((bytes, version)) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Decode(key.clone(), e))?;
                Ok(Some((value, version)))
            }
        }
    }

    /// `BatchGet` over an arbitrary list of keys.
    pub async fn batch_get_raw(
        &self,
        keys: &[Key],
    ) -> Vec<Option<(Vec<u8>, Versionstamp)>> {
        let data = self.inner.data.lock().await;
        keys.iter().map(|k| data.get(k).cloned()).collect()
    }

    /// `ListByPrefix`: every entry whose key lies under `prefix`, in
    /// lexicographic key order (guaranteed by the `BTreeMap` backing
    /// store).
    pub async fn list_by_prefix_raw(
        &self,
        prefix: &Key,
    ) -> Vec<(Key, Vec<u8>, Versionstamp)> {
        let data = self.inner.data.lock().await;
        data.iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (bytes, version))| (k.clone(), bytes.clone(), *version))
            .collect()
    }

    /// Typed `ListByPrefix`.
    pub async fn list_by_prefix<T: DeserializeOwned>(
        &self,
        prefix: &Key,
    ) -> Result<Vec<(Key, T, Versionstamp)>, StoreError> {
        let mut out = Vec::new();
        for (key, bytes, version) in self.list_by_prefix_raw(prefix).await {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Decode(key.clone(), e))?;
            out.push((key, value, version));
        }
        Ok(out)
    }

    /// Reads a singleton record that may not have been written yet,
    /// returning a default value plus the precondition a caller should
    /// attach to a commit that depends on its current state (`Absent` if
    /// it doesn't exist yet, its versionstamp otherwise). Used for
    /// singletons like `ActiveGames` that start out implicitly empty.
    pub async fn get_singleton_or_default<T: DeserializeOwned + Default>(
        &self,
        key: &Key,
    ) -> Result<(T, crate::commit::Precondition), StoreError> {
        match self.get::<T>(key).await? {
            Some((value, version)) => {
                Ok((value, crate::commit::Precondition::version(key.clone(), version)))
            }
            None => Ok((T::default(), crate::commit::Precondition::absent(key.clone()))),
        }
    }

    /// `AtomicCommit`: checks every precondition against the current
    /// state, and if (and only if) all hold, applies every write and
    /// stamps each touched key with one freshly allocated versionstamp.
    ///
    /// On precondition failure, no write is applied and
    /// [`StoreError::Conflict`] names the first key that failed.
    pub async fn commit(&self, request: CommitRequest) -> Result<Versionstamp, StoreError> {
        let mut data = self.inner.data.lock().await;

        for precondition in &request.preconditions {
            let current = data.get(&precondition.key);
            let holds = match (&precondition.expect, current) {
                (Expect::Absent, None) => true,
                (Expect::Version(expected), Some((_, actual))) => expected == actual,
                _ => false,
            };
            if !holds {
                return Err(StoreError::Conflict(precondition.key.clone()));
            }
        }

        let version = self.inner.clock.tick();
        let mut touched = Vec::with_capacity(request.writes.len());
        for mutation in request.writes {
            match mutation {
                Mutation::Put(key, bytes) => {
                    data.insert(key.clone(), (bytes, version));
                    touched.push(key);
                }
                Mutation::Delete(key) => {
                    data.remove(&key);
                    touched.push(key);
                }
            }
        }
        drop(data);

        for key in touched {
            // No receivers is not an error — watchers may simply not exist
            // for this key right now.
            let _ = self.inner.changes.send(KeyChanged { key, version });
        }

        Ok(version)
    }

    /// Convenience for commits with no preconditions that carry no
    /// business semantics beyond "write this" — still routed through
    /// `commit` so every write goes through the same versionstamp and
    /// change-notification path.
    pub async fn put<T: Serialize>(&self, key: Key, value: &T) -> Result<Versionstamp, StoreError> {
        let bytes = serde_json::to_vec(value).map_err(StoreError::Encode)?;
        self.commit(CommitRequest::new().write(Mutation::Put(key, bytes)))
            .await
    }

    /// Subscribes to changes on the given keys. The returned handle's
    /// `next()` pends until one of them is written or deleted, then
    /// yields a fresh `BatchGet` snapshot of all of them — callers that
    /// only care about one "trigger" key and a separately-derived
    /// listing (spec.md §9 design note (b)) simply re-run their own
    /// projection after each `next()`.
    pub fn watch(&self, keys: Vec<Key>) -> WatchHandle {
        WatchHandle::new(self.clone(), keys, self.inner.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::Precondition;

    fn k(s: &str) -> Key {
        Key::singleton(s)
    }

    #[tokio::test]
    async fn test_get_missing_key_returns_none() {
        let store = Store::new();
        assert!(store.get_raw(&k("missing")).await.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let store = Store::new();
        store.put(k("a"), &42u32).await.unwrap();
        let (value, _version): (u32, _) = store.get(&k("a")).await.unwrap().unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_commit_conflict_on_stale_version() {
        let store = Store::new();
        let v1 = store.put(k("a"), &1u32).await.unwrap();
        // Overwrite once so v1 is stale.
        store.put(k("a"), &2u32).await.unwrap();

        let result = store
            .commit(
                CommitRequest::new()
                    .require(Precondition::version(k("a"), v1))
                    .write(Mutation::Put(k("a"), serde_json::to_vec(&3u32).unwrap())),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_commit_absent_precondition_rejects_existing_key() {
        let store = Store::new();
        store.put(k("a"), &1u32).await.unwrap();

        let result = store
            .commit(
                CommitRequest::new()
                    .require(Precondition::absent(k("a")))
                    .write(Mutation::Put(k("a"), serde_json::to_vec(&2u32).unwrap())),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_commit_applies_nothing_on_conflict() {
        let store = Store::new();
        store.put(k("a"), &1u32).await.unwrap();
        store.put(k("a"), &2u32).await.unwrap(); // a is now version 2

        let stale_version = Versionstamp(1);
        let _ = store
            .commit(
                CommitRequest::new()
                    .require(Precondition::version(k("a"), stale_version))
                    .write(Mutation::Put(k("b"), serde_json::to_vec(&99u32).unwrap())),
            )
            .await;

        assert!(store.get_raw(&k("b")).await.is_none());
    }

    #[tokio::test]
    async fn test_list_by_prefix_orders_lexicographically() {
        let store = Store::new();
        store
            .put(Key::new(["q", "c"]), &1u32)
            .await
            .unwrap();
        store
            .put(Key::new(["q", "a"]), &1u32)
            .await
            .unwrap();
        store
            .put(Key::new(["q", "b"]), &1u32)
            .await
            .unwrap();

        let listed = store.list_by_prefix_raw(&Key::singleton("q")).await;
        let keys: Vec<String> = listed.into_iter().map(|(k, _, _)| k.as_str().to_string()).collect();
        assert_eq!(keys, vec!["q/a", "q/b", "q/c"]);
    }

    #[tokio::test]
    async fn test_delete_removes_key() {
        let store = Store::new();
        store.put(k("a"), &1u32).await.unwrap();
        store
            .commit(CommitRequest::new().write(Mutation::Delete(k("a"))))
            .await
            .unwrap();
        assert!(store.get_raw(&k("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_watch_fires_on_matching_key_change() {
        let store = Store::new();
        let mut handle = store.watch(vec![k("a")]);

        let store2 = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            store2.put(k("a"), &1u32).await.unwrap();
        });

        let snapshot = handle.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].is_some());
    }
}
