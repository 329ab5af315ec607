//! Error types for the identity layer.

/// Errors that can occur while resolving or mutating user/token records.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No token record exists for the presented bearer token.
    #[error("token not recognized")]
    TokenNotFound,

    /// The token's `expires_at_ms` is at or before now.
    #[error("token expired")]
    TokenExpired,

    /// A token resolved to a user id with no matching user record. This
    /// should not happen in a correctly maintained store — it indicates a
    /// dangling reference.
    #[error("user not found: {0}")]
    UserNotFound(arcforge_protocol::UserId),

    /// A lower-level store failure (encode/decode, unexpected conflict
    /// exhaustion) propagated up.
    #[error(transparent)]
    Store(#[from] arcforge_store::StoreError),
}
