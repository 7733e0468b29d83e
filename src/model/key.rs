use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::ids::{CandidateId, VoterId};

/// Fixed key of the single election record.
pub const ELECTION_KEY: &str = "election";

const VOTER_PREFIX: &str = "voter/";
const TALLY_PREFIX: &str = "tally/";

/// A key in the ledger's key space.
///
/// Voter and tally records are kept under distinct prefixes, so a voter
/// and a candidate may share a name without overwriting each other, and
/// neither can shadow the election record.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerKey(String);

impl LedgerKey {
    /// Key of the election metadata record.
    pub fn election() -> Self {
        Self(ELECTION_KEY.to_string())
    }

    /// Key of the given voter's record.
    pub fn voter(voter_id: &VoterId) -> Self {
        Self(format!("{VOTER_PREFIX}{voter_id}"))
    }

    /// Key of the given candidate's tally record.
    pub fn tally(candidate_id: &CandidateId) -> Self {
        Self(format!("{TALLY_PREFIX}{candidate_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LedgerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
