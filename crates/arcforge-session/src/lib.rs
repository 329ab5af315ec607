//! User identity and bearer-token sessions for Arcforge.
//!
//! This crate owns the `users/{userId}`, `usersByUsername/{username}`,
//! and `tokens/{token}` key families (spec.md §6) — everything needed to
//! turn a bearer token presented on a new connection into a durable
//! `User` record, and to mint fresh tokens and guest identities.
//!
//! # How it fits in the stack
//!
//! ```text
//! Hub layer (above)      ← resolves a connection's token into a User
//!     ↕
//! Session layer (this crate)  ← users, tokens, the username index
//!     ↕
//! Store layer (below)    ← the persisted records themselves
//! ```

mod error;
mod tokens;
mod types;
mod users;

pub use error::SessionError;
pub use tokens::{issue_token, resolve_token, DEFAULT_TOKEN_TTL_DAYS};
pub use types::{Token, User};
pub use users::{create_guest_user, get_user, rename_user};
