mod state;

pub use state::{ElectionState, UnknownState};

use crate::model::mongodb::Id;

/// Our election IDs are generated object IDs.
pub type ElectionId = Id;
/// Our candidate IDs are generated object IDs.
pub type CandidateId = Id;
/// Voters are identified by their carnet.
pub type VoterId = String;
