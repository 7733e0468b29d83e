//! The versioned key-value store the election state machine runs on.
//!
//! Every key carries a version that the store bumps on each write.
//! Callers read through a [`Transaction`], which remembers the version of
//! every key it saw; at commit time the store checks those versions and
//! rejects the whole batch if any of them moved.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::LedgerKey;

#[cfg(test)]
mod interleaved;
mod memory;
mod mongo;
mod transaction;

#[cfg(test)]
pub use interleaved::Interleaved;
pub use memory::MemoryLedger;
pub use mongo::MongoLedger;
pub use transaction::Transaction;

/// A ledger shared between request handlers.
pub type SharedLedger = Arc<dyn LedgerStore>;

/// Monotonic per-key version stamp.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a key's first write.
    pub const INITIAL: Version = Version(1);

    pub fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The version a key moves to on its next write.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A stored value together with its current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: Version,
}

/// Everything a transaction wants to commit: the versions it observed and
/// the values it wants to write.
///
/// Keys are held in sorted order so every replica applies a batch the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    reads: BTreeMap<LedgerKey, Option<Version>>,
    writes: BTreeMap<LedgerKey, Vec<u8>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to still be at `version` (or still absent, for `None`)
    /// when the batch commits. The first observation of a key wins.
    pub fn expect(&mut self, key: LedgerKey, version: Option<Version>) {
        self.reads.entry(key).or_insert(version);
    }

    /// Stage a write. A later write to the same key replaces an earlier one.
    pub fn put(&mut self, key: LedgerKey, value: Vec<u8>) {
        self.writes.insert(key, value);
    }

    /// The value staged for `key`, if any.
    pub fn staged(&self, key: &LedgerKey) -> Option<&[u8]> {
        self.writes.get(key).map(Vec::as_slice)
    }

    /// The version `key` was observed at, if the batch read it at all.
    pub fn observed(&self, key: &LedgerKey) -> Option<Option<Version>> {
        self.reads.get(key).copied()
    }

    pub fn reads(&self) -> impl Iterator<Item = (&LedgerKey, Option<Version>)> {
        self.reads.iter().map(|(key, version)| (key, *version))
    }

    pub fn writes(&self) -> impl Iterator<Item = (&LedgerKey, &[u8])> {
        self.writes.iter().map(|(key, value)| (key, value.as_slice()))
    }

    /// True if committing would change nothing.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> BTreeMap<LedgerKey, Vec<u8>> {
        self.writes
    }
}

/// A linearizable key-value store with optimistic concurrency control.
#[rocket::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read the current committed value of `key`.
    async fn get(&self, key: &LedgerKey) -> Result<Option<Versioned>, StoreError>;

    /// Read several keys from one consistent snapshot, in the order given.
    async fn get_many(&self, keys: &[LedgerKey]) -> Result<Vec<Option<Versioned>>, StoreError>;

    /// Apply `batch` atomically.
    ///
    /// Fails with [`StoreError::Conflict`] without applying anything if any
    /// key in the read set is no longer at the observed version.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
