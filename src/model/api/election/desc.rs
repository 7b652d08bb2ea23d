use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::election::ElectionState, db::election::Election};

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    /// Election unique ID.
    pub id: ApiId,
    /// Election name.
    pub name: String,
    /// When the election takes place.
    pub date: DateTime<Utc>,
    /// Election state.
    pub state: ElectionState,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            name: election.election.name,
            date: election.election.date,
            state: election.election.state,
        }
    }
}
