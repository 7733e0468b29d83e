use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::status::Custom, response::Responder, Request};
use thiserror::Error;

use crate::model::{record::DecodeError, CandidateId, VoterId};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the ledger storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A key in the transaction's read set changed before it could commit.
    #[error("Transaction conflicted with a concurrent write")]
    Conflict,
    #[error("Failed to read from the ledger: {0}")]
    ReadFailed(#[source] DbError),
    #[error("Failed to write to the ledger: {0}")]
    WriteFailed(#[source] DbError),
}

/// Errors from initializing or reading the election as a whole.
#[derive(Debug, Error)]
pub enum ElectionError {
    #[error("Malformed candidate list: {0}")]
    MalformedCandidateList(String),
    #[error("The election has already been initialized")]
    AlreadyInitialized,
    #[error("No election data found")]
    NoElectionData,
    #[error("Election record is corrupt: {0}")]
    CorruptElectionRecord(#[source] DecodeError),
    #[error("Tally record for candidate {0} is missing or corrupt")]
    CorruptTallyRecord(CandidateId),
    #[error("Election was modified concurrently, retry the request")]
    ConcurrentConflict,
    #[error(transparent)]
    Store(StoreError),
}

/// Errors from registering or looking up a voter.
#[derive(Debug, Error)]
pub enum VoterError {
    #[error("Voter {0} is already registered")]
    AlreadyRegistered(VoterId),
    #[error("Voter {0} is not registered")]
    VoterNotRegistered(VoterId),
    #[error("Voter record for {voter} is corrupt: {source}")]
    CorruptVoterRecord { voter: VoterId, source: DecodeError },
    #[error("Voter was registered concurrently, retry the request")]
    ConcurrentConflict,
    #[error(transparent)]
    Store(StoreError),
}

/// Errors from casting a vote.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Voter {0} is not registered")]
    VoterNotRegistered(VoterId),
    #[error("Voter record for {voter} is corrupt: {source}")]
    CorruptVoterRecord { voter: VoterId, source: DecodeError },
    #[error("Voter {0} has already voted")]
    AlreadyVoted(VoterId),
    #[error("Candidate {0} does not exist")]
    UnknownCandidate(CandidateId),
    #[error("Tally record for candidate {candidate} is corrupt: {source}")]
    CorruptTallyRecord {
        candidate: CandidateId,
        source: DecodeError,
    },
    #[error("Vote conflicted with a concurrent update, retry the request")]
    ConcurrentConflict,
    #[error(transparent)]
    Store(StoreError),
}

/// Store conflicts become each operation's own `ConcurrentConflict`;
/// everything else passes through untouched.
macro_rules! from_store_error {
    ($($error:ident),*) => {
        $(
            impl From<StoreError> for $error {
                fn from(err: StoreError) -> Self {
                    match err {
                        StoreError::Conflict => Self::ConcurrentConflict,
                        other => Self::Store(other),
                    }
                }
            }
        )*
    };
}

from_store_error!(ElectionError, VoterError, VoteError);

/// Errors from turning a function name and string arguments into a call.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Function {function} takes {expected} argument(s), got {found}")]
    ArgumentCount {
        function: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Function {0} modifies the ledger and must be submitted via invoke")]
    NotReadOnly(&'static str),
}

/// Any error that can be reported to a caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Election(#[from] ElectionError),
    #[error(transparent)]
    Voter(#[from] VoterError),
    #[error(transparent)]
    Vote(#[from] VoteError),
}

impl Error {
    /// The underlying store failure, if the ledger itself could not be
    /// read or written.
    pub fn store_failure(&self) -> Option<&StoreError> {
        match self {
            Self::Election(ElectionError::Store(err))
            | Self::Voter(VoterError::Store(err))
            | Self::Vote(VoteError::Store(err)) => Some(err),
            _ => None,
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Invocation(_) => Status::BadRequest,
            Self::Election(err) => match err {
                ElectionError::MalformedCandidateList(_) => Status::BadRequest,
                ElectionError::NoElectionData => Status::NotFound,
                ElectionError::AlreadyInitialized | ElectionError::ConcurrentConflict => {
                    Status::Conflict
                }
                ElectionError::CorruptElectionRecord(_)
                | ElectionError::CorruptTallyRecord(_)
                | ElectionError::Store(_) => Status::InternalServerError,
            },
            Self::Voter(err) => match err {
                VoterError::VoterNotRegistered(_) => Status::NotFound,
                VoterError::AlreadyRegistered(_) | VoterError::ConcurrentConflict => {
                    Status::Conflict
                }
                VoterError::CorruptVoterRecord { .. } | VoterError::Store(_) => {
                    Status::InternalServerError
                }
            },
            Self::Vote(err) => match err {
                VoteError::VoterNotRegistered(_) | VoteError::UnknownCandidate(_) => {
                    Status::NotFound
                }
                VoteError::AlreadyVoted(_) | VoteError::ConcurrentConflict => Status::Conflict,
                VoteError::CorruptVoterRecord { .. }
                | VoteError::CorruptTallyRecord { .. }
                | VoteError::Store(_) => Status::InternalServerError,
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            debug!("Rejected request: {self}");
        }
        Custom(status, self.to_string()).respond_to(req)
    }
}
