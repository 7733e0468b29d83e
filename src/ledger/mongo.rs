use std::collections::HashMap;

use log::debug;
use mongodb::{
    bson::{doc, spec::BinarySubtype, Binary, Document},
    error::{Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR},
    options::{SessionOptions, UpdateOptions},
    Client, ClientSession, Collection, Database,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::LedgerKey;

use super::{LedgerStore, Version, Versioned, WriteBatch};

/// Name of the collection holding one document per ledger key.
pub const LEDGER_COLLECTION: &str = "ledger";

/// For some reason, the mongodb crate doesn't provide error code constants.
const DUPLICATE_KEY: i32 = 11000;

/// A ledger key as stored in MongoDB.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerEntry {
    #[serde(rename = "_id")]
    key: String,
    value: Binary,
    version: i64,
}

impl LedgerEntry {
    fn into_versioned(self) -> Versioned {
        Versioned {
            value: self.value.bytes,
            // Versions start at 1 and only ever grow by one.
            version: Version::new(self.version as u64),
        }
    }
}

fn binary(value: &[u8]) -> Binary {
    Binary {
        subtype: BinarySubtype::Generic,
        bytes: value.to_vec(),
    }
}

fn version_filter(key: &LedgerKey, version: Version) -> Document {
    doc! { "_id": key.as_str(), "version": version.get() as i64 }
}

/// Return true if the given error is a duplicate key write error.
fn is_duplicate_key_error(err: &DbError) -> bool {
    if let ErrorKind::Write(WriteFailure::WriteError(ref e)) = *err.kind {
        return e.code == DUPLICATE_KEY;
    }
    false
}

/// Sort a failed write into a conflict with another transaction or a real failure.
fn classify_write_error(err: DbError) -> StoreError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) || is_duplicate_key_error(&err) {
        debug!("MongoDB reported a write conflict: {err}");
        StoreError::Conflict
    } else {
        StoreError::WriteFailed(err)
    }
}

/// A ledger backed by a MongoDB replica set.
///
/// Each commit runs inside a multi-document transaction; multi-key reads
/// use a snapshot session.
#[derive(Debug, Clone)]
pub struct MongoLedger {
    client: Client,
    db: Database,
    entries: Collection<LedgerEntry>,
}

impl MongoLedger {
    /// Use the ledger collection in the given database.
    pub fn new(client: Client, db: Database) -> Self {
        let entries = db.collection(LEDGER_COLLECTION);
        Self {
            client,
            db,
            entries,
        }
    }

    /// Connect to the MongoDB deployment at `uri` and use database `db_name`.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        Ok(Self::new(client, db))
    }

    /// The database holding the ledger.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Apply every operation of `batch` inside the session's open transaction.
    async fn apply(
        &self,
        batch: &WriteBatch,
        session: &mut ClientSession,
    ) -> Result<(), StoreError> {
        for (key, observed) in batch.reads() {
            let conflict = match (observed, batch.staged(key)) {
                (Some(version), Some(value)) => {
                    let update = doc! {
                        "$set": { "value": binary(value) },
                        "$inc": { "version": 1_i64 },
                    };
                    let result = self
                        .entries
                        .update_one_with_session(version_filter(key, version), update, None, session)
                        .await
                        .map_err(classify_write_error)?;
                    result.matched_count == 0
                }
                (None, Some(value)) => {
                    let entry = LedgerEntry {
                        key: key.to_string(),
                        value: binary(value),
                        version: Version::INITIAL.get() as i64,
                    };
                    self.entries
                        .insert_one_with_session(entry, None, session)
                        .await
                        .map_err(classify_write_error)?;
                    false
                }
                (Some(version), None) => {
                    // Rewrite the version in place: this takes the document's
                    // write lock, so a concurrent writer conflicts with us.
                    let update = doc! { "$set": { "version": version.get() as i64 } };
                    let result = self
                        .entries
                        .update_one_with_session(version_filter(key, version), update, None, session)
                        .await
                        .map_err(classify_write_error)?;
                    result.matched_count == 0
                }
                (None, None) => self
                    .entries
                    .find_one_with_session(doc! { "_id": key.as_str() }, None, session)
                    .await
                    .map_err(StoreError::ReadFailed)?
                    .is_some(),
            };
            if conflict {
                debug!("Rejecting commit: {key} moved since it was read");
                return Err(StoreError::Conflict);
            }
        }

        // Writes to keys that were never read are applied unconditionally.
        let upsert = UpdateOptions::builder().upsert(true).build();
        for (key, value) in batch.writes() {
            if batch.observed(key).is_some() {
                continue;
            }
            let update = doc! {
                "$set": { "value": binary(value) },
                "$inc": { "version": 1_i64 },
            };
            self.entries
                .update_one_with_session(
                    doc! { "_id": key.as_str() },
                    update,
                    upsert.clone(),
                    session,
                )
                .await
                .map_err(classify_write_error)?;
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl LedgerStore for MongoLedger {
    async fn get(&self, key: &LedgerKey) -> Result<Option<Versioned>, StoreError> {
        let entry = self
            .entries
            .find_one(doc! { "_id": key.as_str() }, None)
            .await
            .map_err(StoreError::ReadFailed)?;
        Ok(entry.map(LedgerEntry::into_versioned))
    }

    async fn get_many(&self, keys: &[LedgerKey]) -> Result<Vec<Option<Versioned>>, StoreError> {
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self
            .client
            .start_session(Some(session_options))
            .await
            .map_err(StoreError::ReadFailed)?;

        let ids = keys.iter().map(LedgerKey::as_str).collect::<Vec<_>>();
        let mut cursor = self
            .entries
            .find_with_session(doc! { "_id": { "$in": ids } }, None, &mut session)
            .await
            .map_err(StoreError::ReadFailed)?;

        let mut found = HashMap::with_capacity(keys.len());
        while let Some(entry) = cursor.next(&mut session).await {
            let entry = entry.map_err(StoreError::ReadFailed)?;
            found.insert(entry.key.clone(), entry.into_versioned());
        }

        Ok(keys.iter().map(|key| found.get(key.as_str()).cloned()).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut session = self
            .client
            .start_session(None)
            .await
            .map_err(StoreError::WriteFailed)?;
        session
            .start_transaction(None)
            .await
            .map_err(StoreError::WriteFailed)?;

        if let Err(err) = self.apply(&batch, &mut session).await {
            if let Err(abort_err) = session.abort_transaction().await {
                debug!("Failed to abort ledger transaction: {abort_err}");
            }
            return Err(err);
        }

        session
            .commit_transaction()
            .await
            .map_err(classify_write_error)
    }
}
