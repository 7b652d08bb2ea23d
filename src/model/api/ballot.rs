use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::election::VoterId};

/// A ballot that a voter wishes to cast for a candidate in the election
/// named by the route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotSpec {
    pub carnet: VoterId,
    pub candidate_id: ApiId,
}
