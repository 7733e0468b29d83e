use serde::Serialize;

use crate::error::{InvocationError, Result};
use crate::model::{CandidateId, ElectionRecord, ElectionResults, VoterId};

use super::admin::parse_candidate_list;

const INIT_ELECTION: &str = "InitElection";
const REGISTER_VOTER: &str = "RegisterVoter";
const CAST_VOTE: &str = "CastVote";
const GET_RESULTS: &str = "GetResults";
const GET_VOTER_STATUS: &str = "GetVoterStatus";
const GET_ELECTION_INFO: &str = "GetElectionInfo";

/// A contract call in the ledger's function-name-plus-string-arguments
/// convention, parsed into typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    InitElection {
        candidates: Vec<CandidateId>,
        start_time: String,
        end_time: String,
    },
    RegisterVoter(VoterId),
    CastVote {
        voter: VoterId,
        candidate: CandidateId,
    },
    GetResults,
    GetVoterStatus(VoterId),
    GetElectionInfo,
}

/// Check the argument count and hand the arguments back as an array.
fn take_args<const N: usize>(
    function: &'static str,
    args: Vec<String>,
) -> std::result::Result<[String; N], InvocationError> {
    let found = args.len();
    <[String; N]>::try_from(args).map_err(|_| InvocationError::ArgumentCount {
        function,
        expected: N,
        found,
    })
}

impl Invocation {
    /// Parse `function` applied to `args`.
    ///
    /// `InitElection` takes its candidates as a JSON array of strings.
    pub fn parse(function: &str, args: Vec<String>) -> Result<Self> {
        let invocation = match function {
            INIT_ELECTION => {
                let [candidates, start_time, end_time] = take_args(INIT_ELECTION, args)?;
                Self::InitElection {
                    candidates: parse_candidate_list(&candidates)?,
                    start_time,
                    end_time,
                }
            }
            REGISTER_VOTER => {
                let [voter] = take_args(REGISTER_VOTER, args)?;
                Self::RegisterVoter(voter.into())
            }
            CAST_VOTE => {
                let [voter, candidate] = take_args(CAST_VOTE, args)?;
                Self::CastVote {
                    voter: voter.into(),
                    candidate: candidate.into(),
                }
            }
            GET_RESULTS => {
                let [] = take_args(GET_RESULTS, args)?;
                Self::GetResults
            }
            GET_VOTER_STATUS => {
                let [voter] = take_args(GET_VOTER_STATUS, args)?;
                Self::GetVoterStatus(voter.into())
            }
            GET_ELECTION_INFO => {
                let [] = take_args(GET_ELECTION_INFO, args)?;
                Self::GetElectionInfo
            }
            other => return Err(InvocationError::UnknownFunction(other.to_string()).into()),
        };
        Ok(invocation)
    }

    /// The function name this invocation is called by.
    pub fn function(&self) -> &'static str {
        match self {
            Self::InitElection { .. } => INIT_ELECTION,
            Self::RegisterVoter(_) => REGISTER_VOTER,
            Self::CastVote { .. } => CAST_VOTE,
            Self::GetResults => GET_RESULTS,
            Self::GetVoterStatus(_) => GET_VOTER_STATUS,
            Self::GetElectionInfo => GET_ELECTION_INFO,
        }
    }

    /// Does this invocation leave the ledger untouched?
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::GetResults | Self::GetVoterStatus(_) | Self::GetElectionInfo
        )
    }
}

/// What an invocation returns. Mutations return nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InvocationOutput {
    Unit,
    Results(ElectionResults),
    VoterStatus(bool),
    ElectionInfo(ElectionRecord),
}
