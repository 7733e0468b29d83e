use std::sync::Arc;

use log::{debug, error};

use crate::error::{ElectionError, VoterError};
use crate::ledger::{LedgerStore, Versioned};
use crate::model::{
    ElectionRecord, ElectionResults, LedgerKey, Record, TallyRecord, VoterId, VoterRecord,
};

/// Read-only views of the election. Never writes, never blocks writers.
pub struct TallyReader<S: ?Sized = dyn LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore + ?Sized> TallyReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The election metadata.
    pub async fn get_election_info(&self) -> Result<ElectionRecord, ElectionError> {
        let stored = self.store.get(&LedgerKey::election()).await?;
        decode_election(stored)
    }

    /// Every candidate's count, in roster order.
    ///
    /// The roster and the tallies are read from one snapshot. A single
    /// missing or corrupt tally fails the whole call.
    pub async fn get_results(&self) -> Result<ElectionResults, ElectionError> {
        // The snapshot's roster must match the one its tally keys came from.
        let mut roster = self.get_election_info().await?.candidates;
        let (election, stored) = loop {
            let keys = std::iter::once(LedgerKey::election())
                .chain(roster.iter().map(LedgerKey::tally))
                .collect::<Vec<_>>();
            let mut stored = self.store.get_many(&keys).await?;
            let tallies = stored.split_off(1);
            let election = decode_election(stored.pop().flatten())?;
            if election.candidates == roster {
                break (election, tallies);
            }
            debug!("Roster changed while reading results, reading again");
            roster = election.candidates;
        };

        let mut tallies = Vec::with_capacity(election.candidates.len());
        for (candidate, record) in election.candidates.into_iter().zip(stored) {
            let tally = match record.map(|r| TallyRecord::decode(&r.value)) {
                Some(Ok(tally)) => tally,
                Some(Err(e)) => {
                    error!("Tally record for {candidate} does not decode: {e}");
                    return Err(ElectionError::CorruptTallyRecord(candidate));
                }
                None => {
                    error!("Tally record for {candidate} is missing");
                    return Err(ElectionError::CorruptTallyRecord(candidate));
                }
            };
            tallies.push((candidate, tally.count));
        }
        Ok(ElectionResults::new(tallies))
    }

    /// Whether the voter has cast their vote.
    pub async fn get_voter_status(&self, voter_id: VoterId) -> Result<bool, VoterError> {
        let stored = match self.store.get(&LedgerKey::voter(&voter_id)).await? {
            Some(stored) => stored,
            None => return Err(VoterError::VoterNotRegistered(voter_id)),
        };
        match VoterRecord::decode(&stored.value) {
            Ok(voter) => Ok(voter.has_voted),
            Err(source) => Err(VoterError::CorruptVoterRecord {
                voter: voter_id,
                source,
            }),
        }
    }
}

fn decode_election(stored: Option<Versioned>) -> Result<ElectionRecord, ElectionError> {
    let stored = stored.ok_or(ElectionError::NoElectionData)?;
    ElectionRecord::decode(&stored.value).map_err(ElectionError::CorruptElectionRecord)
}
