//! Per-connection handler: handshake, identity resolution, and
//! lobby/game message pumping.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive Handshake → validate protocol version
//!   2. `game_id` absent → `ConfigureLobbyConnection`; present →
//!      `ConfigureGameConnection` (spec.md §4.6)
//!   3. Send HandshakeAck on success, Error + close on failure
//!   4. Loop: pump inbound envelopes into the hub connection, pump its
//!      outbound updates back onto the wire, until either side closes.

use std::sync::Arc;
use std::time::Duration;

use arcforge_game::Game;
use arcforge_hub::{GameInbound, LobbyInbound};
use arcforge_protocol::{Channel, Codec, Envelope, Payload, SystemMessage};
use arcforge_transport::{Connection, WebSocketConnection};

use crate::server::{ServerState, PROTOCOL_VERSION};
use crate::ArcforgeError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<G, C>>,
) -> Result<(), ArcforgeError>
where
    G: Game,
    C: Codec + Clone,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (version, token, game_id) = recv_handshake(&conn, &state).await?;

    if version != PROTOCOL_VERSION {
        send_error(
            &conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ArcforgeError::Protocol(
            arcforge_protocol::ProtocolError::InvalidMessage("protocol version mismatch".into()),
        ));
    }

    match game_id {
        Some(game_id) => run_game_connection(conn, state, game_id, token).await,
        None => run_lobby_connection(conn, state, token).await,
    }
}

/// Receives and decodes the first envelope, which must be a Handshake.
async fn recv_handshake<G, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<G, C>>,
) -> Result<(u32, Option<String>, Option<arcforge_protocol::GameId>), ArcforgeError>
where
    G: Game,
    C: Codec + Clone,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ArcforgeError::Protocol(
                arcforge_protocol::ProtocolError::InvalidMessage(
                    "connection closed before handshake".into(),
                ),
            ));
        }
        Ok(Err(e)) => return Err(ArcforgeError::Transport(e)),
        Err(_) => {
            return Err(ArcforgeError::Protocol(
                arcforge_protocol::ProtocolError::InvalidMessage("handshake timed out".into()),
            ));
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    match envelope.payload {
        Payload::System(SystemMessage::Handshake {
            version,
            token,
            game_id,
        }) => Ok((version, token, game_id)),
        _ => {
            send_error(conn, &state.codec, 400, "expected Handshake").await?;
            Err(ArcforgeError::Protocol(
                arcforge_protocol::ProtocolError::InvalidMessage(
                    "first message must be Handshake".into(),
                ),
            ))
        }
    }
}

/// Runs a lobby connection: requires a valid, unexpired token
/// (`ConfigureLobbyConnection`, spec.md §4.6) — unlike a game
/// connection, there is no observer fallback here.
async fn run_lobby_connection<G, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<G, C>>,
    token: Option<String>,
) -> Result<(), ArcforgeError>
where
    G: Game,
    C: Codec + Clone,
{
    let Some(token) = token else {
        send_error(&conn, &state.codec, 401, "token required").await?;
        return Err(ArcforgeError::Session(arcforge_session::SessionError::TokenNotFound));
    };

    let (_, user) = match arcforge_session::resolve_token(&state.store, &token).await {
        Ok(resolved) => resolved,
        Err(e) => {
            send_error(&conn, &state.codec, 401, &e.to_string()).await?;
            return Err(ArcforgeError::Session(e));
        }
    };

    let mut lobby_conn = state.lobby_hub.connect(user.user_id.clone()).await?;
    send_handshake_ack(&conn, &state.codec).await?;
    tracing::info!(user_id = %user.user_id, "lobby connection established");

    let mut seq: u64 = 0;
    loop {
        tokio::select! {
            incoming = tokio::time::timeout(IDLE_TIMEOUT, conn.recv()) => {
                match incoming {
                    Ok(Ok(Some(data))) => {
                        let envelope: Envelope = match state.codec.decode(&data) {
                            Ok(env) => env,
                            Err(e) => {
                                tracing::debug!(error = %e, "failed to decode lobby envelope");
                                continue;
                            }
                        };
                        match envelope.payload {
                            Payload::Lobby(bytes) => {
                                let msg: LobbyInbound<G> = match state.codec.decode(&bytes) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        tracing::debug!(error = %e, "invalid lobby message");
                                        continue;
                                    }
                                };
                                for reply in lobby_conn.handle_inbound(msg).await {
                                    send_lobby(&conn, &state.codec, &mut seq, reply).await?;
                                }
                            }
                            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                                send_heartbeat_ack(&conn, &state.codec, &mut seq, client_time).await?;
                            }
                            Payload::System(SystemMessage::Disconnect { .. }) => break,
                            _ => {}
                        }
                    }
                    Ok(Ok(None)) => break,
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "recv error");
                        break;
                    }
                    Err(_) => break,
                }
            }
            update = lobby_conn.next_update() => {
                match update {
                    Some(outbound) => send_lobby(&conn, &state.codec, &mut seq, outbound).await?,
                    None => break,
                }
            }
        }
    }

    Ok(())
}

/// Runs a game connection: resolves `playerId` if the token's user is a
/// seat of this game, else falls back to an observer connection
/// (`ConfigureGameConnection`, spec.md §4.6). Closes the socket right
/// after sending the first `UpdateGameState` whose `outcome` is defined
/// (spec.md §6) — the game record itself is retained past completion, so
/// nothing else would ever end this loop.
async fn run_game_connection<G, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<G, C>>,
    game_id: arcforge_protocol::GameId,
    token: Option<String>,
) -> Result<(), ArcforgeError>
where
    G: Game,
    C: Codec + Clone,
{
    let player_id = match &token {
        Some(t) => {
            let (record, _) = arcforge_game::read_game::<G>(&state.store, &game_id).await?;
            match arcforge_session::resolve_token(&state.store, t).await {
                Ok((_, user)) => record.seat_of(&user.user_id),
                Err(_) => None,
            }
        }
        None => None,
    };

    let mut game_conn = state.game_hub.connect(game_id.clone(), player_id).await?;
    send_handshake_ack(&conn, &state.codec).await?;
    tracing::info!(%game_id, ?player_id, "game connection established");

    let mut seq: u64 = 0;
    loop {
        tokio::select! {
            incoming = tokio::time::timeout(IDLE_TIMEOUT, conn.recv()) => {
                match incoming {
                    Ok(Ok(Some(data))) => {
                        let envelope: Envelope = match state.codec.decode(&data) {
                            Ok(env) => env,
                            Err(e) => {
                                tracing::debug!(error = %e, "failed to decode game envelope");
                                continue;
                            }
                        };
                        match envelope.payload {
                            Payload::Game(bytes) => {
                                let msg: GameInbound<G> = match state.codec.decode(&bytes) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        tracing::debug!(error = %e, "invalid game message");
                                        continue;
                                    }
                                };
                                for reply in game_conn.handle_inbound(msg).await {
                                    let ended = game_outcome_is_set(&reply);
                                    send_game(&conn, &state.codec, &mut seq, reply).await?;
                                    if ended {
                                        return Ok(());
                                    }
                                }
                            }
                            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                                send_heartbeat_ack(&conn, &state.codec, &mut seq, client_time).await?;
                            }
                            Payload::System(SystemMessage::Disconnect { .. }) => break,
                            _ => {}
                        }
                    }
                    Ok(Ok(None)) => break,
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "recv error");
                        break;
                    }
                    Err(_) => break,
                }
            }
            update = game_conn.next_update() => {
                match update {
                    Some(outbound) => {
                        let ended = game_outcome_is_set(&outbound);
                        send_game(&conn, &state.codec, &mut seq, outbound).await?;
                        if ended {
                            return Ok(());
                        }
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

async fn send_handshake_ack(
    conn: &WebSocketConnection,
    codec: &impl Codec,
) -> Result<(), ArcforgeError> {
    let envelope = Envelope {
        seq: 0,
        timestamp: 0,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::HandshakeAck { server_time: now_ms() }),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(ArcforgeError::Transport)
}

async fn send_heartbeat_ack(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    seq: &mut u64,
    client_time: u64,
) -> Result<(), ArcforgeError> {
    let envelope = Envelope {
        seq: next_seq(seq),
        timestamp: now_ms(),
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::HeartbeatAck {
            client_time,
            server_time: now_ms(),
        }),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(ArcforgeError::Transport)
}

async fn send_lobby<G: Game>(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    seq: &mut u64,
    outbound: arcforge_hub::LobbyOutbound<G>,
) -> Result<(), ArcforgeError> {
    let envelope = Envelope {
        seq: next_seq(seq),
        timestamp: now_ms(),
        channel: Channel::ReliableOrdered,
        payload: Payload::Lobby(codec.encode(&outbound)?),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(ArcforgeError::Transport)
}

async fn send_game<G: Game>(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    seq: &mut u64,
    outbound: arcforge_hub::GameOutbound<G>,
) -> Result<(), ArcforgeError> {
    let envelope = Envelope {
        seq: next_seq(seq),
        timestamp: now_ms(),
        channel: Channel::ReliableOrdered,
        payload: Payload::Game(codec.encode(&outbound)?),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(ArcforgeError::Transport)
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), ArcforgeError> {
    let envelope = Envelope {
        seq: 0,
        timestamp: now_ms(),
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::Error {
            code,
            message: message.to_string(),
        }),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(ArcforgeError::Transport)
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

/// `true` if `outbound` is an `UpdateGameState` carrying a defined
/// `outcome` — the signal to close the channel after sending it (spec.md
/// §6: "The channel is closed by the server after the first message
/// carrying a defined `outcome`").
fn game_outcome_is_set<G: Game>(outbound: &arcforge_hub::GameOutbound<G>) -> bool {
    matches!(
        outbound,
        arcforge_hub::GameOutbound::UpdateGameState { outcome: Some(_), .. }
    )
}
