//! # Arcforge
//!
//! Turn-based multiplayer game-hosting framework.
//!
//! Arcforge provides a server-authoritative architecture where game
//! authors implement a single [`Game`] trait (re-exported from
//! `arcforge-game`) and the framework handles transport, identity,
//! matchmaking, and realtime state fan-out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arcforge::prelude::*;
//!
//! // Implement Game for your game, then:
//! // let server = ArcforgeServer::builder()
//! //     .bind("0.0.0.0:8080")
//! //     .build::<MyGame>()
//! //     .await?;
//! // server.run().await
//! ```

mod error;
mod handler;
mod props;
mod server;

pub use error::ArcforgeError;
pub use props::{GameProps, LobbyProps};
pub use server::{ArcforgeServer, ArcforgeServerBuilder, ArcforgeServerHandle, PROTOCOL_VERSION};

/// Re-exports for the common case of implementing one game type and
/// running a server for it.
pub mod prelude {
    pub use crate::{
        ArcforgeError, ArcforgeServer, ArcforgeServerBuilder, ArcforgeServerHandle, GameProps,
        LobbyProps, PROTOCOL_VERSION,
    };
    pub use arcforge_game::{Game, MoveContext, OutcomeContext, ProjectionContext, QueueDef};
    pub use arcforge_protocol::{GameId, Player, PlayerId, QueueId, RoomId, UserId};
}
