//! Optimistic-concurrency retry loop: re-read, build, commit, and on
//! conflict do it again.
//!
//! Every mutating operation in the matchmaker and game-runtime layers
//! follows this shape (spec.md §5's "read-modify-write" contract), so it
//! lives here once instead of being hand-rolled at every call site.

use std::future::Future;

use crate::error::StoreError;
use crate::store::Store;
use crate::versionstamp::Versionstamp;

const WARN_AFTER_ATTEMPTS: u32 = 3;

/// Repeatedly calls `build` to construct a fresh `CommitRequest` from the
/// store's current state, then commits it. `build` is expected to re-read
/// whatever it needs from `store` itself on every call — the retry loop
/// does not cache anything across attempts, since a conflict means the
/// state it last saw is stale.
///
/// Only [`StoreError::Conflict`] is retried. Any other error from `build`
/// or from the commit itself is returned immediately.
pub async fn retry_commit<F, Fut>(store: &Store, mut build: F) -> Result<Versionstamp, StoreError>
where
    F: FnMut(&Store) -> Fut,
    Fut: Future<Output = Result<crate::commit::CommitRequest, StoreError>>,
{
    let mut attempts: u32 = 0;
    loop {
        let request = build(store).await?;
        match store.commit(request).await {
            Ok(version) => return Ok(version),
            Err(StoreError::Conflict(key)) => {
                attempts += 1;
                if attempts > WARN_AFTER_ATTEMPTS {
                    tracing::warn!(
                        %key,
                        attempts,
                        "retrying commit after repeated conflicts"
                    );
                }
                continue;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{CommitRequest, Mutation, Precondition};
    use crate::key::Key;

    #[tokio::test]
    async fn test_retry_commit_succeeds_immediately_with_no_contention() {
        let store = Store::new();
        let version = retry_commit(&store, |_store| async {
            Ok(CommitRequest::new().write(Mutation::Put(Key::singleton("a"), b"1".to_vec())))
        })
        .await
        .unwrap();
        assert_eq!(version.0, 1);
    }

    #[tokio::test]
    async fn test_retry_commit_recovers_from_conflict() {
        let store = Store::new();
        store.put(Key::singleton("counter"), &0u32).await.unwrap();

        // Simulate one external writer racing us exactly once.
        let raced = std::sync::atomic::AtomicBool::new(false);

        let version = retry_commit(&store, |store| {
            let raced = &raced;
            async move {
                let (value, version) = store
                    .get::<u32>(&Key::singleton("counter"))
                    .await
                    .unwrap()
                    .unwrap();

                if !raced.swap(true, std::sync::atomic::Ordering::SeqCst) {
                    // Sneak in a conflicting write before we commit, so our
                    // stale-read precondition fails exactly once.
                    store.put(Key::singleton("counter"), &(value + 100)).await.unwrap();
                }

                Ok(CommitRequest::new()
                    .require(Precondition::version(Key::singleton("counter"), version))
                    .write(Mutation::Put(
                        Key::singleton("counter"),
                        serde_json::to_vec(&(value + 1)).unwrap(),
                    )))
            }
        })
        .await
        .unwrap();

        assert!(version.0 > 0);
        let (final_value, _): (u32, _) = store
            .get(&Key::singleton("counter"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(final_value, 101);
    }
}
