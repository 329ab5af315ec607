//! Core protocol types for Arcforge's wire format.
//!
//! These are the structures that get serialized to bytes, sent over the
//! network, and deserialized on the other side — the "language" client and
//! server speak below the lobby/game message layer (see `arcforge-hub`).

use serde::{Deserialize, Serialize};

use crate::{GameId, PlayerId};

// ---------------------------------------------------------------------------
// Channel — delivery guarantees
// ---------------------------------------------------------------------------

/// The delivery guarantee for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Channel {
    /// Delivered in order, no loss. The default for lobby and game traffic —
    /// both channels in this spec carry state that must arrive complete
    /// and in order.
    #[default]
    ReliableOrdered,

    /// Delivered (no loss), but may arrive out of order.
    ReliableUnordered,
}

// ---------------------------------------------------------------------------
// SystemMessage — connection-lifecycle framing
// ---------------------------------------------------------------------------

/// Messages used by the framework's connection layer (not lobby/game
/// specific): handshake, authentication, heartbeats, and errors.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "Handshake", "version": 1, "token": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: "Hello, I want to connect." `token` is the bearer
    /// token issued by `GetInitialLobbyProps`/`GetInitialGameProps`; a
    /// missing or expired token is rejected at handshake time. `game_id`
    /// is absent for a lobby connection, present for a game connection —
    /// a missing token on a game connection still succeeds as an
    /// observer (spec.md §4.6).
    Handshake {
        version: u32,
        token: Option<String>,
        #[serde(default)]
        game_id: Option<GameId>,
    },

    /// Server → Client: "Welcome, you're connected."
    HandshakeAck {
        server_time: u64,
    },

    /// Either direction: "I'm disconnecting."
    Disconnect {
        reason: String,
    },

    /// Client → Server: "I'm still here."
    Heartbeat {
        client_time: u64,
    },

    /// Server → Client: "I see you, here's timing info."
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    /// Server → Client: "Something went wrong at the connection layer"
    /// (bad handshake, expired token, malformed envelope). Per-message
    /// application errors use `DisplayError` on the lobby channel instead.
    Error {
        code: u16,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Payload — what's inside an envelope
// ---------------------------------------------------------------------------

/// The content of a message: connection framing, or channel-specific data.
///
/// `Lobby`/`Game` carry pre-encoded bytes (the corresponding
/// `LobbyInbound<G>`/`LobbyOutbound<G>` or `GameInbound<G>`/`GameOutbound<G>`
/// from `arcforge-hub`, encoded with the connection's `Codec`) — the
/// protocol layer doesn't know `G` and only passes these through, the same
/// way the teacher's `Payload::Game(Vec<u8>)` passed through
/// `GameLogic::ClientMessage`/`ServerMessage` bytes untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Lobby(Vec<u8>),
    Game(Vec<u8>),
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every message on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Auto-incrementing sequence number, one counter per direction.
    pub seq: u64,

    /// Milliseconds since the connection was established.
    pub timestamp: u64,

    #[serde(default)]
    pub channel: Channel,

    pub payload: Payload,
}

/// A player's identity as shown to other players: a username plus whether
/// they're a guest account. Snapshotted into `Game::players[]` at game
/// creation time so a later username change doesn't retroactively alter a
/// completed game's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    pub is_guest: bool,
}

/// One seat's worth of identity, paired with its seat index. Used when
/// describing a game's roster in wire payloads and store records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub player_id: PlayerId,
    pub player: Player,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_default_is_reliable_ordered() {
        assert_eq!(Channel::default(), Channel::ReliableOrdered);
    }

    #[test]
    fn test_channel_serializes_as_pascal_case() {
        let json = serde_json::to_string(&Channel::ReliableOrdered).unwrap();
        assert_eq!(json, "\"ReliableOrdered\"");
    }

    #[test]
    fn test_system_message_handshake_json_format() {
        let msg = SystemMessage::Handshake {
            version: 1,
            token: Some("abc".into()),
            game_id: None,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["token"], "abc");
    }

    #[test]
    fn test_system_message_handshake_without_token() {
        let msg = SystemMessage::Handshake {
            version: 1,
            token: None,
            game_id: None,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert!(json["token"].is_null());
    }

    #[test]
    fn test_payload_lobby_json_format() {
        let payload = Payload::Lobby(vec![1, 2, 3]);
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Lobby");
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_payload_game_json_format() {
        let payload = Payload::Game(vec![4, 5, 6]);
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Game");
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope {
            seq: 42,
            timestamp: 15000,
            channel: Channel::ReliableOrdered,
            payload: Payload::Game(vec![1, 2, 3]),
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_envelope_channel_defaults_when_missing() {
        let json = r#"{
            "seq": 1,
            "timestamp": 100,
            "payload": { "type": "Game", "data": [1] }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.channel, Channel::ReliableOrdered);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<Envelope, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_system_message_type_returns_error() {
        let unknown = r#"{"type": "FlyToMoon", "speed": 9000}"#;
        let result: Result<SystemMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_handshake_without_game_id_defaults_to_lobby() {
        let json = r#"{"type": "Handshake", "version": 1, "token": "abc"}"#;
        let msg: SystemMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            SystemMessage::Handshake {
                version: 1,
                token: Some("abc".into()),
                game_id: None,
            }
        );
    }

    #[test]
    fn test_handshake_with_game_id_targets_game_connection() {
        let msg = SystemMessage::Handshake {
            version: 1,
            token: Some("abc".into()),
            game_id: Some(crate::GameId::new("g1")),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["game_id"], "g1");
    }

    #[test]
    fn test_player_round_trip() {
        let p = Player {
            username: "guest-0042".into(),
            is_guest: true,
        };
        let bytes = serde_json::to_vec(&p).unwrap();
        let decoded: Player = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(p, decoded);
    }
}
