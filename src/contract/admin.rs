use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use rocket::serde::json::serde_json;

use crate::error::ElectionError;
use crate::ledger::{LedgerStore, Transaction};
use crate::model::{CandidateId, ElectionRecord, LedgerKey, TallyRecord};

/// Parse a JSON array of candidate names, e.g. `["Alice", "Bob"]`.
pub fn parse_candidate_list(candidates_json: &str) -> Result<Vec<CandidateId>, ElectionError> {
    serde_json::from_str(candidates_json)
        .map_err(|e| ElectionError::MalformedCandidateList(e.to_string()))
}

/// Reject rosters that cannot seed one distinct tally per candidate.
fn check_roster(candidates: &[CandidateId]) -> Result<(), ElectionError> {
    if candidates.is_empty() {
        return Err(ElectionError::MalformedCandidateList(
            "no candidates given".to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    for candidate in candidates {
        if candidate.is_empty() {
            return Err(ElectionError::MalformedCandidateList(
                "candidate names must not be empty".to_string(),
            ));
        }
        if !seen.insert(candidate.as_str()) {
            return Err(ElectionError::MalformedCandidateList(format!(
                "candidate {candidate} is listed more than once"
            )));
        }
    }
    Ok(())
}

/// Sets up the election: its metadata and a zeroed tally per candidate.
pub struct ElectionAdmin<S: ?Sized = dyn LedgerStore> {
    store: Arc<S>,
    allow_reinitialization: bool,
}

impl<S: LedgerStore + ?Sized> ElectionAdmin<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            allow_reinitialization: false,
        }
    }

    /// Permit `init` to overwrite an existing election, resetting the
    /// listed candidates' tallies to zero.
    pub fn with_reinitialization(mut self, allow: bool) -> Self {
        self.allow_reinitialization = allow;
        self
    }

    /// Write the election record and seed every candidate's tally at zero,
    /// all in one transaction.
    pub async fn init(
        &self,
        candidates: Vec<CandidateId>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Result<(), ElectionError> {
        check_roster(&candidates)?;

        let mut tx = Transaction::new(&*self.store);
        let election_key = LedgerKey::election();
        if !self.allow_reinitialization && tx.get(&election_key).await?.is_some() {
            return Err(ElectionError::AlreadyInitialized);
        }

        for candidate in &candidates {
            tx.put_record(LedgerKey::tally(candidate), &TallyRecord::zero());
        }
        let num_candidates = candidates.len();
        let election = ElectionRecord::new(candidates, start_time.into(), end_time.into());
        tx.put_record(election_key, &election);
        tx.commit().await?;

        debug!("Initialized election with {num_candidates} candidates");
        Ok(())
    }
}
