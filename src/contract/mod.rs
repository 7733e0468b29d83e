//! The election contract: the operations every node runs against its
//! replica of the ledger.

use std::sync::Arc;

use log::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::ledger::LedgerStore;

pub use admin::{parse_candidate_list, ElectionAdmin};
pub use ballot::BallotProcessor;
pub use identity::{Caller, IdentityContext};
pub use invocation::{Invocation, InvocationOutput};
pub use tally::TallyReader;

mod admin;
mod ballot;
mod identity;
mod invocation;
mod tally;

/// All contract components over one shared ledger.
pub struct VotingContract<S: ?Sized = dyn LedgerStore> {
    admin: ElectionAdmin<S>,
    ballots: BallotProcessor<S>,
    tally: TallyReader<S>,
}

impl<S: LedgerStore + ?Sized> VotingContract<S> {
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        Self {
            admin: ElectionAdmin::new(store.clone())
                .with_reinitialization(config.allow_reinitialization()),
            ballots: BallotProcessor::new(store.clone()),
            tally: TallyReader::new(store),
        }
    }

    pub fn admin(&self) -> &ElectionAdmin<S> {
        &self.admin
    }

    pub fn ballots(&self) -> &BallotProcessor<S> {
        &self.ballots
    }

    pub fn tally(&self) -> &TallyReader<S> {
        &self.tally
    }

    /// Run an invocation on behalf of `caller`.
    pub async fn invoke(
        &self,
        caller: &dyn IdentityContext,
        invocation: Invocation,
    ) -> Result<InvocationOutput> {
        let caller = caller.caller_id();
        let function = invocation.function();
        debug!("{caller} invoked {function}");

        let output = match invocation {
            Invocation::InitElection {
                candidates,
                start_time,
                end_time,
            } => {
                self.admin.init(candidates, start_time, end_time).await?;
                info!("{caller} initialized the election");
                InvocationOutput::Unit
            }
            Invocation::RegisterVoter(voter) => {
                self.ballots.register(voter.clone()).await?;
                info!("{caller} registered voter {voter}");
                InvocationOutput::Unit
            }
            Invocation::CastVote { voter, candidate } => {
                self.ballots.vote(voter.clone(), candidate).await?;
                // The chosen candidate stays out of the log.
                info!("{caller} recorded a vote for voter {voter}");
                InvocationOutput::Unit
            }
            Invocation::GetResults => InvocationOutput::Results(self.tally.get_results().await?),
            Invocation::GetVoterStatus(voter) => {
                InvocationOutput::VoterStatus(self.tally.get_voter_status(voter).await?)
            }
            Invocation::GetElectionInfo => {
                InvocationOutput::ElectionInfo(self.tally.get_election_info().await?)
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ElectionError, Error, VoteError};
    use crate::ledger::SharedLedger;
    use crate::model::ElectionResults;

    use super::*;

    fn call(function: &str, args: &[&str]) -> Invocation {
        Invocation::parse(function, args.iter().map(|a| a.to_string()).collect()).unwrap()
    }

    #[backend_test]
    async fn invoke_full_election(ledger: SharedLedger) {
        let contract = VotingContract::new(ledger, &Config::default());
        let caller = Caller::new("registrar");

        for invocation in [
            call("InitElection", &[r#"["Alice","Bob"]"#, "t0", "t1"]),
            call("RegisterVoter", &["v1"]),
            call("CastVote", &["v1", "Alice"]),
        ] {
            let output = contract.invoke(&caller, invocation).await.unwrap();
            assert_eq!(output, InvocationOutput::Unit);
        }

        let results = contract
            .invoke(&caller, call("GetResults", &[]))
            .await
            .unwrap();
        assert_eq!(
            results,
            InvocationOutput::Results(ElectionResults::new(vec![
                ("Alice".into(), 1),
                ("Bob".into(), 0),
            ]))
        );

        let status = contract
            .invoke(&Caller::anonymous(), call("GetVoterStatus", &["v1"]))
            .await
            .unwrap();
        assert_eq!(status, InvocationOutput::VoterStatus(true));

        let info = contract
            .invoke(&caller, call("GetElectionInfo", &[]))
            .await
            .unwrap();
        assert!(matches!(info, InvocationOutput::ElectionInfo(e) if e.end_time == "t1"));
    }

    #[backend_test]
    async fn invoke_reports_contract_errors(ledger: SharedLedger) {
        let contract = VotingContract::new(ledger, &Config::default());
        let caller = Caller::anonymous();
        contract
            .admin()
            .init(vec!["Alice".into()], "t0", "t1")
            .await
            .unwrap();
        contract.ballots().register("v1".into()).await.unwrap();
        assert!(!contract.tally().get_voter_status("v1".into()).await.unwrap());

        let result = contract.invoke(&caller, call("CastVote", &["v9", "Alice"])).await;
        assert!(matches!(
            result,
            Err(Error::Vote(VoteError::VoterNotRegistered(v))) if v == "v9"
        ));

        let result = contract
            .invoke(&caller, call("InitElection", &[r#"["Bob"]"#, "t2", "t3"]))
            .await;
        assert!(matches!(
            result,
            Err(Error::Election(ElectionError::AlreadyInitialized))
        ));
    }

    #[backend_test]
    async fn reinitialization_follows_config(ledger: SharedLedger) {
        let contract = VotingContract::new(ledger, &Config::new(true));
        let caller = Caller::anonymous();
        for roster in [r#"["Alice"]"#, r#"["Alice","Bob"]"#] {
            contract
                .invoke(&caller, call("InitElection", &[roster, "t0", "t1"]))
                .await
                .unwrap();
        }
        let info = contract.tally().get_election_info().await.unwrap();
        assert_eq!(info.candidates.len(), 2);
    }
}
