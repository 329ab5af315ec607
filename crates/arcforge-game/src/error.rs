//! Error types for the game layer.

use arcforge_protocol::GameId;

/// Errors that can occur while applying a move or reading a game record.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No game record exists for the given id.
    #[error("game {0} not found")]
    NotFound(GameId),

    /// A lower-level store failure propagated up.
    #[error(transparent)]
    Store(#[from] arcforge_store::StoreError),
}
