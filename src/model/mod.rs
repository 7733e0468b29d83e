pub mod ids;
pub mod key;
pub mod record;
pub mod results;

pub use ids::{CandidateId, VoterId};
pub use key::LedgerKey;
pub use record::{ElectionRecord, Record, TallyRecord, VoterRecord};
pub use results::ElectionResults;
