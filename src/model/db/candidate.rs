use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionId};

/// A candidate from the database. Candidates belong to exactly one election.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
    pub election_id: ElectionId,
    pub name: String,
    pub party: String,
}
