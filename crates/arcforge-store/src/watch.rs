//! Change notification: watch a set of keys, wake on the first write or
//! delete to any of them.
//!
//! This mirrors spec.md's design note (b): a watch never hands back the
//! new value of the key that changed. It hands back a fresh `BatchGet` of
//! every key the caller subscribed to, and leaves any further derived
//! projection (re-listing a prefix, re-deriving "available rooms") up to
//! the caller. A single broadcast channel carries every commit's touched
//! keys; each `WatchHandle` filters for the keys it cares about.

use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::key::Key;
use crate::store::Store;
use crate::versionstamp::Versionstamp;

#[derive(Debug, Clone)]
pub(crate) struct KeyChanged {
    pub key: Key,
    #[allow(dead_code)]
    pub version: Versionstamp,
}

/// A subscription to a fixed set of keys.
pub struct WatchHandle {
    store: Store,
    keys: Vec<Key>,
    rx: broadcast::Receiver<KeyChanged>,
}

impl WatchHandle {
    pub(crate) fn new(store: Store, keys: Vec<Key>, rx: broadcast::Receiver<KeyChanged>) -> Self {
        Self { store, keys, rx }
    }

    /// Waits for the next write or delete to any watched key, then
    /// returns a fresh `BatchGet` snapshot of all watched keys in the
    /// order they were passed to [`Store::watch`].
    ///
    /// Returns [`StoreError::NotFound`] only if the underlying store is
    /// shutting down (the broadcast channel closed) — callers should treat
    /// that as "stop watching", not as a missing key.
    pub async fn next(&mut self) -> Result<Vec<Option<(Vec<u8>, Versionstamp)>>, StoreError> {
        loop {
            match self.rx.recv().await {
                Ok(changed) => {
                    if self.keys.iter().any(|k| *k == changed.key) {
                        return Ok(self.store.batch_get_raw(&self.keys).await);
                    }
                    // Not one of ours — keep waiting.
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch handle lagged behind the change stream");
                    // We may have missed a relevant change; resync by
                    // re-reading unconditionally rather than risk missing
                    // an update entirely.
                    return Ok(self.store.batch_get_raw(&self.keys).await);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(StoreError::NotFound(Key::singleton("<store closed>")));
                }
            }
        }
    }
}
