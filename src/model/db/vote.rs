use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionId, VoterId};

/// A single ballot in the vote ledger. At most one exists per (election, voter).
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub election_id: ElectionId,
    pub voter_id: VoterId,
    pub candidate_id: CandidateId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// The running vote count of one candidate in one election.
/// Only ever incremented.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteTally {
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub votes: i64,
}
