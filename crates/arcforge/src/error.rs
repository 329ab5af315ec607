//! Unified error type for the Arcforge framework.

use arcforge_protocol::ProtocolError;
use arcforge_session::SessionError;
use arcforge_store::StoreError;
use arcforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `arcforge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ArcforgeError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, token, user lookup).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A matchmaking-level error (queue, room, graduation).
    #[error(transparent)]
    Matchmaker(#[from] arcforge_matchmaker::MatchmakerError),

    /// A game-runtime error (unknown game, applying a move).
    #[error(transparent)]
    Game(#[from] arcforge_game::GameError),

    /// A connection fan-out error (lobby/game hub).
    #[error(transparent)]
    Hub(#[from] arcforge_hub::HubError),

    /// A lower-level store failure not already wrapped by a higher layer.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let arcforge_err: ArcforgeError = err.into();
        assert!(matches!(arcforge_err, ArcforgeError::Transport(_)));
        assert!(arcforge_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let arcforge_err: ArcforgeError = err.into();
        assert!(matches!(arcforge_err, ArcforgeError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::TokenNotFound;
        let arcforge_err: ArcforgeError = err.into();
        assert!(matches!(arcforge_err, ArcforgeError::Session(_)));
    }

    #[test]
    fn test_from_game_error() {
        let err = arcforge_game::GameError::NotFound(arcforge_protocol::GameId::new("g1"));
        let arcforge_err: ArcforgeError = err.into();
        assert!(matches!(arcforge_err, ArcforgeError::Game(_)));
    }

    #[test]
    fn test_from_hub_error() {
        let err = arcforge_hub::HubError::UserNotFound(arcforge_protocol::UserId::new("u1"));
        let arcforge_err: ArcforgeError = err.into();
        assert!(matches!(arcforge_err, ArcforgeError::Hub(_)));
    }
}
