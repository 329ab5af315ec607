//! Error types for the connection fan-out layer.

use arcforge_protocol::UserId;

/// Errors that can occur while driving a lobby or game connection.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The connecting user has no durable record — a dangling bearer
    /// token, or a user deleted out from under a live connection.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// `ConfigureGameConnection` named a game, or a move targeted one,
    /// that no game record exists for.
    #[error(transparent)]
    Game(#[from] arcforge_game::GameError),

    /// A lower-level matchmaking failure propagated up from a lobby
    /// message handler.
    #[error(transparent)]
    Matchmaker(#[from] arcforge_matchmaker::MatchmakerError),

    /// A lower-level session failure (user lookup) propagated up.
    #[error(transparent)]
    Session(#[from] arcforge_session::SessionError),

    /// A lower-level store failure propagated up.
    #[error(transparent)]
    Store(#[from] arcforge_store::StoreError),
}
