//! `ArcforgeServer` builder and server loop.
//!
//! This ties together every layer: transport → protocol → session →
//! matchmaker/game-runtime → hub. Unlike the teacher crate's
//! `Authenticator`, identity is no longer pluggable — bearer tokens are
//! minted and validated entirely by `arcforge-session` (spec.md §1).

use std::sync::Arc;

use arcforge_game::Game;
use arcforge_hub::{GameHub, LobbyHub};
use arcforge_protocol::{Codec, GameId, JsonCodec};
use arcforge_store::{IdGenerator, Store};
use arcforge_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::props::{self, GameProps, LobbyProps};
use crate::ArcforgeError;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<G: Game, C: Codec> {
    pub(crate) store: Store,
    pub(crate) id_gen: Arc<IdGenerator>,
    pub(crate) lobby_hub: LobbyHub<G>,
    pub(crate) game_hub: GameHub<G>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting an Arcforge server.
///
/// # Example
///
/// ```rust,ignore
/// use arcforge::ArcforgeServer;
///
/// let server = ArcforgeServer::builder()
///     .bind("0.0.0.0:8080")
///     .build::<MyGame>()
///     .await?;
/// server.run().await
/// ```
pub struct ArcforgeServerBuilder {
    bind_addr: String,
}

impl ArcforgeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Builds and starts the server for game type `G`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` as defaults (MVP).
    pub async fn build<G: Game>(self) -> Result<ArcforgeServer<G, JsonCodec>, ArcforgeError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let store = Store::new();
        let id_gen = Arc::new(IdGenerator::new());
        let lobby_hub = LobbyHub::new(store.clone(), Arc::clone(&id_gen));
        let game_hub = GameHub::new(store.clone());

        let state = Arc::new(ServerState {
            store,
            id_gen,
            lobby_hub,
            game_hub,
            codec: JsonCodec,
        });

        Ok(ArcforgeServer { transport, state })
    }
}

impl Default for ArcforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Arcforge game server.
///
/// Call [`run()`](Self::run) to start accepting connections — this
/// takes the server by value, since it owns the listening socket. The
/// initial-props RPCs ([`get_initial_lobby_props`](Self::get_initial_lobby_props),
/// [`get_initial_game_props`](Self::get_initial_game_props)) can be
/// called at any point before `run()` is started; to call them while
/// the server is running, clone out an [`ArcforgeServerHandle`] first
/// (spec.md §4.6, §6) — they're the side of the external interface
/// that lives outside the WebSocket upgrade.
pub struct ArcforgeServer<G: Game, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<G, C>>,
}

/// A cheap, `Clone`-able handle to the initial-props RPCs, independent
/// of the connection-accepting [`ArcforgeServer`]. Clone one out via
/// [`ArcforgeServer::handle`] before calling [`ArcforgeServer::run`],
/// which takes the server by value.
pub struct ArcforgeServerHandle<G: Game> {
    store: Store,
    id_gen: Arc<IdGenerator>,
    _game: std::marker::PhantomData<fn() -> G>,
}

impl<G: Game> Clone for ArcforgeServerHandle<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            id_gen: Arc::clone(&self.id_gen),
            _game: std::marker::PhantomData,
        }
    }
}

impl<G: Game> ArcforgeServerHandle<G> {
    /// `GetInitialLobbyProps(token?) → {props, token}` (spec.md §4.6).
    pub async fn get_initial_lobby_props(
        &self,
        token: Option<&str>,
    ) -> Result<(LobbyProps<G>, String), ArcforgeError> {
        props::get_initial_lobby_props::<G>(&self.store, &self.id_gen, token).await
    }

    /// `GetInitialGameProps(gameId, token?) → props` (spec.md §4.6).
    pub async fn get_initial_game_props(
        &self,
        game_id: &GameId,
        token: Option<&str>,
    ) -> Result<GameProps<G>, ArcforgeError> {
        props::get_initial_game_props::<G>(&self.store, game_id, token).await
    }
}

impl<G, C> ArcforgeServer<G, C>
where
    G: Game,
    C: Codec + Clone,
{
    /// Creates a new builder.
    pub fn builder() -> ArcforgeServerBuilder {
        ArcforgeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Clones out a handle to the initial-props RPCs that outlives
    /// `run()` taking this server by value.
    pub fn handle(&self) -> ArcforgeServerHandle<G> {
        ArcforgeServerHandle {
            store: self.state.store.clone(),
            id_gen: Arc::clone(&self.state.id_gen),
            _game: std::marker::PhantomData,
        }
    }

    /// `GetInitialLobbyProps(token?) → {props, token}` (spec.md §4.6).
    pub async fn get_initial_lobby_props(
        &self,
        token: Option<&str>,
    ) -> Result<(LobbyProps<G>, String), ArcforgeError> {
        props::get_initial_lobby_props::<G>(&self.state.store, &self.state.id_gen, token).await
    }

    /// `GetInitialGameProps(gameId, token?) → props` (spec.md §4.6).
    pub async fn get_initial_game_props(
        &self,
        game_id: &GameId,
        token: Option<&str>,
    ) -> Result<GameProps<G>, ArcforgeError> {
        props::get_initial_game_props::<G>(&self.state.store, game_id, token).await
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections, performs the handshake, and spawns
    /// a handler task for each. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), ArcforgeError> {
        tracing::info!("Arcforge server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection::<G, C>(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
