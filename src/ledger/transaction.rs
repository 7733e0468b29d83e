use crate::error::StoreError;
use crate::model::{LedgerKey, Record};

use super::{LedgerStore, WriteBatch};

/// A single read-then-write unit of work against a [`LedgerStore`].
///
/// Reads go straight to the store (or to this transaction's own staged
/// writes); writes are buffered until [`Transaction::commit`], which submits
/// them together with the versions of everything read.
pub struct Transaction<'s, S: LedgerStore + ?Sized> {
    store: &'s S,
    batch: WriteBatch,
}

impl<'s, S: LedgerStore + ?Sized> Transaction<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            batch: WriteBatch::new(),
        }
    }

    /// Read the raw bytes stored under `key`.
    pub async fn get(&mut self, key: &LedgerKey) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(staged) = self.batch.staged(key) {
            return Ok(Some(staged.to_vec()));
        }
        let versioned = self.store.get(key).await?;
        self.batch
            .expect(key.clone(), versioned.as_ref().map(|v| v.version));
        Ok(versioned.map(|v| v.value))
    }

    /// Stage raw bytes to be written under `key`.
    pub fn put(&mut self, key: LedgerKey, value: Vec<u8>) {
        self.batch.put(key, value);
    }

    /// Stage a record to be written under `key`.
    pub fn put_record<R: Record>(&mut self, key: LedgerKey, record: &R) {
        self.put(key, record.encode());
    }

    /// Submit the staged writes. Transactions that wrote nothing commit trivially.
    pub async fn commit(self) -> Result<(), StoreError> {
        if self.batch.is_read_only() {
            return Ok(());
        }
        self.store.commit(self.batch).await
    }
}
