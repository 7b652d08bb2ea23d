use serde::{Deserialize, Serialize};

use crate::model::{common::election::VoterId, db::voter::Voter};

/// A voter to register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterSpec {
    pub carnet: VoterId,
    pub name: String,
}

/// An API-friendly voter description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    pub carnet: VoterId,
    pub name: String,
    pub has_voted: bool,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            carnet: voter.carnet,
            name: voter.name,
            has_voted: voter.has_voted,
        }
    }
}

/// Turnout across the whole voter roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStats {
    pub total: u64,
    /// Voters who have not voted yet.
    pub active: u64,
    pub voted: u64,
    /// Every registered voter, ordered by carnet.
    pub voters: Vec<VoterDescription>,
}

impl VoterStats {
    /// Summarise the given voters, which must already be ordered.
    pub fn from_voters(voters: Vec<Voter>) -> Self {
        let voted = voters.iter().filter(|v| v.has_voted).count() as u64;
        let total = voters.len() as u64;
        Self {
            total,
            active: total - voted,
            voted,
            voters: voters.into_iter().map(Into::into).collect(),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterSpec {
        pub fn example(carnet: &str, name: &str) -> Self {
            Self {
                carnet: carnet.to_string(),
                name: name.to_string(),
            }
        }
    }
}
