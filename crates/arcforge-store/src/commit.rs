//! Commit requests: preconditions plus writes, applied atomically.

use crate::{Key, Versionstamp};

/// What a precondition expects to find at a key before a commit may
/// proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// The key currently has exactly this versionstamp.
    Version(Versionstamp),
    /// The key currently does not exist.
    Absent,
}

/// A single precondition: a key plus what must be true of it.
#[derive(Debug, Clone)]
pub struct Precondition {
    pub key: Key,
    pub expect: Expect,
}

impl Precondition {
    pub fn version(key: Key, version: Versionstamp) -> Self {
        Self {
            key,
            expect: Expect::Version(version),
        }
    }

    pub fn absent(key: Key) -> Self {
        Self {
            key,
            expect: Expect::Absent,
        }
    }
}

/// A single write: either set a key's value or remove it.
#[derive(Debug, Clone)]
pub enum Mutation {
    Put(Key, Vec<u8>),
    Delete(Key),
}

impl Mutation {
    pub fn key(&self) -> &Key {
        match self {
            Mutation::Put(k, _) => k,
            Mutation::Delete(k) => k,
        }
    }
}

/// A set of preconditions and writes applied as a single atomic unit.
///
/// All preconditions are checked against the current store state; if any
/// fails, none of the writes are applied and the commit returns
/// [`crate::StoreError::Conflict`]. If all hold, every write takes effect
/// and every touched key (written or deleted) receives the same fresh
/// [`Versionstamp`].
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Mutation>,
}

impl CommitRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn write(mut self, mutation: Mutation) -> Self {
        self.writes.push(mutation);
        self
    }
}
