use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::candidate::Candidate};

/// A candidate to add to an election's roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
}

/// An API-friendly candidate description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub name: String,
    pub party: String,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            election_id: candidate.election_id.into(),
            name: candidate.name,
            party: candidate.party,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateSpec {
        pub fn example(name: &str, party: &str) -> Self {
            Self {
                name: name.to_string(),
                party: party.to_string(),
            }
        }
    }
}
