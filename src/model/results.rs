use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::model::ids::CandidateId;

/// Vote counts for every candidate, in roster order.
///
/// Serialises as a JSON object whose keys follow roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionResults {
    tallies: Vec<(CandidateId, u64)>,
}

impl ElectionResults {
    pub fn new(tallies: Vec<(CandidateId, u64)>) -> Self {
        Self { tallies }
    }

    /// Count for the given candidate, if they are on the roster.
    pub fn get(&self, candidate: &str) -> Option<u64> {
        self.tallies
            .iter()
            .find(|(id, _)| id.as_str() == candidate)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CandidateId, u64)> {
        self.tallies.iter().map(|(id, count)| (id, *count))
    }

    pub fn candidates(&self) -> impl Iterator<Item = &CandidateId> {
        self.tallies.iter().map(|(id, _)| id)
    }

    /// Total number of votes counted.
    pub fn total(&self) -> u64 {
        self.tallies.iter().map(|(_, count)| count).sum()
    }
}

impl Serialize for ElectionResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tallies.len()))?;
        for (candidate, count) in &self.tallies {
            map.serialize_entry(candidate, count)?;
        }
        map.end()
    }
}
