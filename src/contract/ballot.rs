use std::sync::Arc;

use log::debug;

use crate::error::{VoteError, VoterError};
use crate::ledger::{LedgerStore, Transaction};
use crate::model::{CandidateId, LedgerKey, Record, TallyRecord, VoterId, VoterRecord};

/// Registers voters and applies their votes.
pub struct BallotProcessor<S: ?Sized = dyn LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore + ?Sized> BallotProcessor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a record for a voter who has not voted yet.
    ///
    /// If another registration for the same voter commits first, this one
    /// fails with [`VoterError::ConcurrentConflict`].
    pub async fn register(&self, voter_id: VoterId) -> Result<(), VoterError> {
        let key = LedgerKey::voter(&voter_id);
        let mut tx = Transaction::new(&*self.store);

        // Existence is all that matters here; the stored value is not inspected.
        if tx.get(&key).await?.is_some() {
            return Err(VoterError::AlreadyRegistered(voter_id));
        }
        tx.put_record(key, &VoterRecord::registered());
        tx.commit().await?;

        debug!("Registered voter {voter_id}");
        Ok(())
    }

    /// Cast `voter_id`'s one vote for `candidate_id`.
    ///
    /// The voter flip and the tally increment commit together, checked
    /// against the versions read here, or not at all.
    pub async fn vote(&self, voter_id: VoterId, candidate_id: CandidateId) -> Result<(), VoteError> {
        let mut tx = Transaction::new(&*self.store);

        // Check the voter.
        let voter_key = LedgerKey::voter(&voter_id);
        let voter_bytes = match tx.get(&voter_key).await? {
            Some(bytes) => bytes,
            None => return Err(VoteError::VoterNotRegistered(voter_id)),
        };
        let mut voter = match VoterRecord::decode(&voter_bytes) {
            Ok(voter) => voter,
            Err(source) => {
                return Err(VoteError::CorruptVoterRecord {
                    voter: voter_id,
                    source,
                })
            }
        };
        if voter.has_voted {
            return Err(VoteError::AlreadyVoted(voter_id));
        }

        // Check the candidate.
        let tally_key = LedgerKey::tally(&candidate_id);
        let tally_bytes = match tx.get(&tally_key).await? {
            Some(bytes) => bytes,
            None => return Err(VoteError::UnknownCandidate(candidate_id)),
        };
        let mut tally = match TallyRecord::decode(&tally_bytes) {
            Ok(tally) => tally,
            Err(source) => {
                return Err(VoteError::CorruptTallyRecord {
                    candidate: candidate_id,
                    source,
                })
            }
        };

        // Count the vote and close off the voter.
        tally.increment();
        tx.put_record(tally_key, &tally);
        voter.mark_voted();
        tx.put_record(voter_key, &voter);
        tx.commit().await?;

        debug!("Voter {voter_id} voted; {candidate_id} now has {}", tally.count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::tokio;

    use crate::contract::{ElectionAdmin, TallyReader};
    use crate::error::ElectionError;
    use crate::ledger::{Interleaved, SharedLedger, WriteBatch};

    use super::*;

    async fn election(ledger: &SharedLedger, candidates: &[&str]) {
        let candidates = candidates.iter().map(|&c| CandidateId::from(c)).collect();
        ElectionAdmin::new(ledger.clone())
            .init(candidates, "2024-12-07T10:00:00Z", "2024-12-08T10:00:00Z")
            .await
            .unwrap();
    }

    #[backend_test]
    async fn scenario(ledger: SharedLedger) {
        election(&ledger, &["Alice", "Bob"]).await;
        let ballots = BallotProcessor::new(ledger.clone());
        let reader = TallyReader::new(ledger);

        ballots.register("v1".into()).await.unwrap();
        ballots.vote("v1".into(), "Alice".into()).await.unwrap();

        let results = reader.get_results().await.unwrap();
        assert_eq!(results.get("Alice"), Some(1));
        assert_eq!(results.get("Bob"), Some(0));
        assert!(reader.get_voter_status("v1".into()).await.unwrap());
    }

    #[backend_test]
    async fn register_twice(ledger: SharedLedger) {
        let ballots = BallotProcessor::new(ledger.clone());
        let reader = TallyReader::new(ledger);

        ballots.register("v1".into()).await.unwrap();
        let result = ballots.register("v1".into()).await;
        assert!(matches!(result, Err(VoterError::AlreadyRegistered(id)) if id.as_str() == "v1"));
        assert!(!reader.get_voter_status("v1".into()).await.unwrap());
    }

    #[backend_test]
    async fn register_does_not_reset_a_voter(ledger: SharedLedger) {
        election(&ledger, &["Alice"]).await;
        let ballots = BallotProcessor::new(ledger.clone());

        ballots.register("v1".into()).await.unwrap();
        ballots.vote("v1".into(), "Alice".into()).await.unwrap();
        assert!(matches!(
            ballots.register("v1".into()).await,
            Err(VoterError::AlreadyRegistered(_))
        ));
        assert!(TallyReader::new(ledger)
            .get_voter_status("v1".into())
            .await
            .unwrap());
    }

    #[backend_test]
    async fn unregistered_voter_cannot_vote(ledger: SharedLedger) {
        election(&ledger, &["Alice", "Bob"]).await;
        let ballots = BallotProcessor::new(ledger.clone());

        let result = ballots.vote("ghost".into(), "Alice".into()).await;
        assert!(matches!(result, Err(VoteError::VoterNotRegistered(_))));

        let results = TallyReader::new(ledger).get_results().await.unwrap();
        assert_eq!(results.total(), 0);
    }

    #[backend_test]
    async fn second_vote_is_rejected(ledger: SharedLedger) {
        election(&ledger, &["Alice", "Bob"]).await;
        let ballots = BallotProcessor::new(ledger.clone());

        ballots.register("v1".into()).await.unwrap();
        ballots.vote("v1".into(), "Alice".into()).await.unwrap();
        let result = ballots.vote("v1".into(), "Bob".into()).await;
        assert!(matches!(result, Err(VoteError::AlreadyVoted(_))));

        let results = TallyReader::new(ledger).get_results().await.unwrap();
        assert_eq!(results.get("Alice"), Some(1));
        assert_eq!(results.get("Bob"), Some(0));
    }

    #[backend_test]
    async fn unknown_candidate_leaves_voter_untouched(ledger: SharedLedger) {
        election(&ledger, &["Alice", "Bob"]).await;
        let ballots = BallotProcessor::new(ledger.clone());
        let reader = TallyReader::new(ledger);

        ballots.register("v1".into()).await.unwrap();
        let result = ballots.vote("v1".into(), "Eve".into()).await;
        assert!(matches!(result, Err(VoteError::UnknownCandidate(id)) if id.as_str() == "Eve"));
        assert!(!reader.get_voter_status("v1".into()).await.unwrap());

        // The voter can still vote for a real candidate.
        ballots.vote("v1".into(), "Bob".into()).await.unwrap();
        assert_eq!(reader.get_results().await.unwrap().get("Bob"), Some(1));
    }

    #[backend_test]
    async fn voter_and_candidate_may_share_a_name(ledger: SharedLedger) {
        election(&ledger, &["Alice", "Bob"]).await;
        let ballots = BallotProcessor::new(ledger.clone());

        ballots.register("Alice".into()).await.unwrap();
        ballots.vote("Alice".into(), "Alice".into()).await.unwrap();

        let results = TallyReader::new(ledger).get_results().await.unwrap();
        assert_eq!(results.get("Alice"), Some(1));
    }

    #[backend_test]
    async fn corrupt_records_are_reported(ledger: SharedLedger) {
        election(&ledger, &["Alice", "Bob"]).await;
        let ballots = BallotProcessor::new(ledger.clone());
        ballots.register("v1".into()).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.put(LedgerKey::tally(&"Bob".into()), b"garbage".to_vec());
        batch.put(LedgerKey::voter(&"v2".into()), b"garbage".to_vec());
        ledger.commit(batch).await.unwrap();

        let result = ballots.vote("v1".into(), "Bob".into()).await;
        assert!(matches!(result, Err(VoteError::CorruptTallyRecord { .. })));
        let result = ballots.vote("v2".into(), "Alice".into()).await;
        assert!(matches!(result, Err(VoteError::CorruptVoterRecord { .. })));

        // Neither failure counted anything.
        let reader = TallyReader::new(ledger);
        assert!(!reader.get_voter_status("v1".into()).await.unwrap());
        assert!(matches!(
            reader.get_results().await,
            Err(ElectionError::CorruptTallyRecord(id)) if id.as_str() == "Bob"
        ));
    }

    #[backend_test]
    async fn interleaved_write_aborts_the_whole_vote(ledger: SharedLedger) {
        let ledger = Arc::new(Interleaved::new(ledger));
        let shared: SharedLedger = ledger.clone();
        election(&shared, &["Alice", "Bob"]).await;
        let ballots = BallotProcessor::new(shared.clone());
        ballots.register("v1".into()).await.unwrap();

        // Another node counts a vote for Alice between our read and our commit.
        let mut intruder = WriteBatch::new();
        let mut bumped = TallyRecord::zero();
        bumped.increment();
        intruder.put(LedgerKey::tally(&"Alice".into()), bumped.encode());
        ledger.before_next_commit(intruder).await;

        let result = ballots.vote("v1".into(), "Alice".into()).await;
        assert!(matches!(result, Err(VoteError::ConcurrentConflict)));

        // Only the intruder's increment landed; the voter was not flipped.
        let reader = TallyReader::new(shared);
        assert_eq!(reader.get_results().await.unwrap().get("Alice"), Some(1));
        assert!(!reader.get_voter_status("v1".into()).await.unwrap());

        // A retry succeeds against the new state.
        ballots.vote("v1".into(), "Alice".into()).await.unwrap();
        assert_eq!(reader.get_results().await.unwrap().get("Alice"), Some(2));
        assert!(reader.get_voter_status("v1".into()).await.unwrap());
    }

    #[backend_test]
    async fn interleaved_registration_conflicts(ledger: SharedLedger) {
        let ledger = Arc::new(Interleaved::new(ledger));
        let mut intruder = WriteBatch::new();
        intruder.put(
            LedgerKey::voter(&"v1".into()),
            VoterRecord::registered().encode(),
        );
        ledger.before_next_commit(intruder).await;

        let ballots = BallotProcessor::new(ledger);
        let result = ballots.register("v1".into()).await;
        assert!(matches!(result, Err(VoterError::ConcurrentConflict)));
    }

    #[backend_test]
    async fn racing_votes_count_once(ledger: SharedLedger) {
        const RACERS: usize = 16;
        election(&ledger, &["Alice", "Bob", "Charlie"]).await;
        let ballots = Arc::new(BallotProcessor::new(ledger.clone()));
        ballots.register("v1".into()).await.unwrap();

        let candidates = ["Alice", "Bob", "Charlie"];
        let handles = (0..RACERS)
            .map(|i| {
                let ballots = ballots.clone();
                let candidate = CandidateId::from(candidates[i % candidates.len()]);
                tokio::spawn(async move { ballots.vote("v1".into(), candidate).await })
            })
            .collect::<Vec<_>>();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(VoteError::AlreadyVoted(_)) | Err(VoteError::ConcurrentConflict) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(successes, 1);

        let results = TallyReader::new(ledger).get_results().await.unwrap();
        assert_eq!(results.total(), 1);
    }

    #[backend_test]
    async fn many_voters_are_all_counted(ledger: SharedLedger) {
        const VOTERS: usize = 30;
        election(&ledger, &["Alice", "Bob"]).await;
        let ballots = Arc::new(BallotProcessor::new(ledger.clone()));
        for i in 0..VOTERS {
            ballots.register(VoterId::new(format!("v{i}"))).await.unwrap();
        }

        // Votes for the same candidate race on its tally; losers retry.
        let handles = (0..VOTERS)
            .map(|i| {
                let ballots = ballots.clone();
                tokio::spawn(async move {
                    let candidate = if i % 3 == 0 { "Bob" } else { "Alice" };
                    loop {
                        match ballots
                            .vote(VoterId::new(format!("v{i}")), candidate.into())
                            .await
                        {
                            Err(VoteError::ConcurrentConflict) => tokio::task::yield_now().await,
                            other => return other,
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let results = TallyReader::new(ledger).get_results().await.unwrap();
        assert_eq!(results.get("Bob"), Some(10));
        assert_eq!(results.get("Alice"), Some(20));
    }
}
