use serde::{Deserialize, Serialize};

/// Running vote count for one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyRecord {
    pub count: u64,
}

impl TallyRecord {
    /// The tally every candidate starts with.
    pub fn zero() -> Self {
        Self { count: 0 }
    }

    /// Count one more vote.
    pub fn increment(&mut self) {
        self.count += 1;
    }
}
