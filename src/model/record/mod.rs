//! Records persisted in the ledger.
//!
//! Every record is stored as a BSON document: field-tagged, self-describing,
//! and tolerant of fields it does not know about.

use mongodb::bson;
use serde::{de::DeserializeOwned, Serialize};

mod election;
mod tally;
mod voter;

pub use election::ElectionRecord;
pub use tally::TallyRecord;
pub use voter::VoterRecord;

/// Error produced when stored bytes do not decode into the expected record.
pub type DecodeError = bson::de::Error;

/// A value that can be written to and read back from a ledger key.
pub trait Record: Serialize + DeserializeOwned {
    /// Encode the record for storage.
    fn encode(&self) -> Vec<u8> {
        // Records are plain structs of strings, bools and small integers.
        bson::to_vec(self).expect("Serialisation is infallible")
    }

    /// Decode a record previously written by [`Record::encode`].
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        bson::from_slice(bytes)
    }
}

impl Record for ElectionRecord {}
impl Record for VoterRecord {}
impl Record for TallyRecord {}
