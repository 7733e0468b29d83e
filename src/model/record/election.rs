use serde::{Deserialize, Serialize};

use crate::model::ids::CandidateId;

/// Election metadata, stored once under the election key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionRecord {
    /// The roster, in display order.
    pub candidates: Vec<CandidateId>,
    /// Opening time, as supplied by the administrator. Not interpreted.
    pub start_time: String,
    /// Closing time, as supplied by the administrator. Not interpreted.
    pub end_time: String,
}

impl ElectionRecord {
    pub fn new(candidates: Vec<CandidateId>, start_time: String, end_time: String) -> Self {
        Self {
            candidates,
            start_time,
            end_time,
        }
    }
}
