//! Transactional key-value store for Arcforge.
//!
//! A single-process, in-memory store offering the operations the rest of
//! the workspace is built on: `Get`, `BatchGet`, `ListByPrefix`,
//! `AtomicCommit` (preconditioned, all-or-nothing writes), and `Watch`
//! (wake on change, re-read yourself). See [`store::Store`] for the full
//! contract.

mod commit;
mod error;
mod id;
mod key;
mod retry;
mod store;
mod versionstamp;
mod views;
mod watch;

pub use commit::{CommitRequest, Expect, Mutation, Precondition};
pub use error::StoreError;
pub use id::IdGenerator;
pub use key::{
    active_games_key, assignment_key, game_key, queue_entry_key, queue_prefix, room_key,
    room_list_trigger_key, room_prefix, token_key, user_key, username_index_key, Key,
};
pub use retry::retry_commit;
pub use store::Store;
pub use versionstamp::{VersionClock, Versionstamp};
pub use watch::WatchHandle;
