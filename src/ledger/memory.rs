use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, trace};
use rocket::tokio::sync::Mutex;

use crate::error::StoreError;
use crate::model::LedgerKey;

use super::{LedgerStore, SharedLedger, Version, Versioned, WriteBatch};

/// A ledger held entirely in process memory.
///
/// Commits validate and apply under a single lock, so they are totally
/// ordered exactly as a replicated ledger would order them.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<BTreeMap<LedgerKey, Versioned>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, empty ledger ready to be shared.
    pub fn shared() -> SharedLedger {
        Arc::new(Self::new())
    }
}

#[rocket::async_trait]
impl LedgerStore for MemoryLedger {
    async fn get(&self, key: &LedgerKey) -> Result<Option<Versioned>, StoreError> {
        Ok(self.state.lock().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[LedgerKey]) -> Result<Vec<Option<Versioned>>, StoreError> {
        let state = self.state.lock().await;
        Ok(keys.iter().map(|key| state.get(key).cloned()).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        for (key, observed) in batch.reads() {
            let current = state.get(key).map(|entry| entry.version);
            if current != observed {
                debug!("Rejecting commit: {key} is at {current:?} but was read at {observed:?}");
                return Err(StoreError::Conflict);
            }
        }

        for (key, value) in batch.into_writes() {
            let version = state
                .get(&key)
                .map_or(Version::INITIAL, |entry| entry.version.next());
            trace!("Committing {key} at version {}", version.get());
            state.insert(key, Versioned { value, version });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{CandidateId, VoterId};

    use super::*;

    #[rocket::async_test]
    async fn blind_writes_bump_versions() {
        let ledger = MemoryLedger::new();
        let key = LedgerKey::tally(&CandidateId::from("Alice"));

        for expected in 1..=3 {
            let mut batch = WriteBatch::new();
            batch.put(key.clone(), vec![expected as u8]);
            ledger.commit(batch).await.unwrap();
            let stored = ledger.get(&key).await.unwrap().unwrap();
            assert_eq!(stored.version, Version::new(expected));
        }
    }

    #[rocket::async_test]
    async fn conflicting_batch_applies_nothing() {
        let ledger = MemoryLedger::new();
        let voter = LedgerKey::voter(&VoterId::from("v1"));
        let tally = LedgerKey::tally(&CandidateId::from("Alice"));

        let mut seed = WriteBatch::new();
        seed.put(voter.clone(), b"voter".to_vec());
        seed.put(tally.clone(), b"tally".to_vec());
        ledger.commit(seed).await.unwrap();

        // Read both at version 1, but the tally moves on before we commit.
        let mut stale = WriteBatch::new();
        stale.expect(voter.clone(), Some(Version::INITIAL));
        stale.expect(tally.clone(), Some(Version::INITIAL));
        stale.put(voter.clone(), b"voter2".to_vec());
        stale.put(tally.clone(), b"tally2".to_vec());

        let mut bump = WriteBatch::new();
        bump.put(tally.clone(), b"bumped".to_vec());
        ledger.commit(bump).await.unwrap();

        assert!(matches!(ledger.commit(stale).await, Err(StoreError::Conflict)));
        let stored = ledger.get_many(&[voter, tally]).await.unwrap();
        assert_eq!(stored[0].as_ref().unwrap().value, b"voter".to_vec());
        assert_eq!(stored[1].as_ref().unwrap().value, b"bumped".to_vec());
    }

    #[rocket::async_test]
    async fn get_many_preserves_order_and_gaps() {
        let ledger = MemoryLedger::new();
        let present = LedgerKey::election();
        let missing = LedgerKey::voter(&VoterId::from("nobody"));

        let mut batch = WriteBatch::new();
        batch.put(present.clone(), b"e".to_vec());
        ledger.commit(batch).await.unwrap();

        let values = ledger
            .get_many(&[missing.clone(), present.clone(), missing])
            .await
            .unwrap();
        assert!(values[0].is_none());
        assert_eq!(values[1].as_ref().unwrap().value, b"e".to_vec());
        assert!(values[2].is_none());
    }
}
