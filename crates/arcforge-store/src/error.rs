//! Error types for the store layer.

use crate::Key;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A precondition in an `AtomicCommit` did not hold — some other
    /// commit won the race. Callers that retry should re-read and rebuild
    /// their commit request; callers of [`crate::retry_commit`] never see
    /// this directly.
    #[error("commit conflict on key {0}")]
    Conflict(Key),

    /// A key required to exist for a mutation to make sense (an
    /// assignment target, a user record) was absent. Unlike `Conflict`,
    /// this is not retryable — the operation is logically invalid.
    #[error("required key not found: {0}")]
    NotFound(Key),

    /// A value in the store failed to deserialize as the type the caller
    /// requested.
    #[error("failed to decode value at {0}: {1}")]
    Decode(Key, serde_json::Error),

    /// A value failed to serialize for storage.
    #[error("failed to encode value: {0}")]
    Encode(serde_json::Error),
}
