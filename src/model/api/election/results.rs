use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::candidate::Candidate};

/// One row of an election's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub candidate_id: ApiId,
    pub name: String,
    pub party: String,
    pub votes: u64,
}

impl CandidateResult {
    pub fn new(candidate: Candidate, votes: u64) -> Self {
        Self {
            candidate_id: candidate.id.into(),
            name: candidate.name,
            party: candidate.party,
            votes,
        }
    }
}

/// How reconciliation treated one candidate's tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyAdjustment {
    pub candidate_id: ApiId,
    /// Ballots for the candidate found in the ledger.
    pub ledger_votes: u64,
    /// The tally before repair.
    pub tally_votes: u64,
    /// Amount added to the tally; zero if it was already in line.
    pub incremented_by: u64,
}

/// Outcome of recounting an election's ledger against its tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub election_id: ApiId,
    /// Total ballots in the ledger.
    pub ballots: u64,
    pub adjustments: Vec<TallyAdjustment>,
}

impl ReconcileReport {
    /// Whether any tally had to be raised.
    pub fn repaired(&self) -> bool {
        self.adjustments.iter().any(|a| a.incremented_by > 0)
    }
}
