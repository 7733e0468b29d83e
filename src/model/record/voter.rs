use serde::{Deserialize, Serialize};

/// Per-voter state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRecord {
    pub has_voted: bool,
}

impl VoterRecord {
    /// A freshly registered voter who has not yet voted.
    pub fn registered() -> Self {
        Self { has_voted: false }
    }

    /// Record that the voter has cast their vote.
    pub fn mark_voted(&mut self) {
        self.has_voted = true;
    }
}
