use serde::{Deserialize, Serialize};

use crate::model::common::election::VoterId;

/// A registered voter, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Voter {
    /// Voter unique ID: their carnet.
    #[serde(rename = "_id")]
    pub carnet: VoterId,
    pub name: String,
    /// Set exactly once, when the voter's first ballot is recorded.
    pub has_voted: bool,
}

impl Voter {
    /// A voter who has not voted yet.
    pub fn new(carnet: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            carnet: carnet.into(),
            name: name.into(),
            has_voted: false,
        }
    }
}
