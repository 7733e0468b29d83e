use rocket::tokio::sync::Mutex;

use crate::error::StoreError;
use crate::model::LedgerKey;

use super::{LedgerStore, SharedLedger, Versioned, WriteBatch};

/// A ledger that lets another writer's batch land at a chosen moment:
/// just before the next commit, or just before the next snapshot read.
pub struct Interleaved {
    inner: SharedLedger,
    before_commit: Mutex<Option<WriteBatch>>,
    before_snapshot: Mutex<Option<WriteBatch>>,
}

impl Interleaved {
    pub fn new(inner: SharedLedger) -> Self {
        Self {
            inner,
            before_commit: Mutex::new(None),
            before_snapshot: Mutex::new(None),
        }
    }

    /// Commit `batch` right before whatever the next caller commits.
    pub async fn before_next_commit(&self, batch: WriteBatch) {
        *self.before_commit.lock().await = Some(batch);
    }

    /// Commit `batch` right before the next `get_many` is served.
    pub async fn before_next_snapshot(&self, batch: WriteBatch) {
        *self.before_snapshot.lock().await = Some(batch);
    }
}

#[rocket::async_trait]
impl LedgerStore for Interleaved {
    async fn get(&self, key: &LedgerKey) -> Result<Option<Versioned>, StoreError> {
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[LedgerKey]) -> Result<Vec<Option<Versioned>>, StoreError> {
        if let Some(intruder) = self.before_snapshot.lock().await.take() {
            self.inner.commit(intruder).await?;
        }
        self.inner.get_many(keys).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if let Some(intruder) = self.before_commit.lock().await.take() {
            self.inner.commit(intruder).await?;
        }
        self.inner.commit(batch).await
    }
}
