use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An election specification, as submitted by a client.
///
/// The state is kept as free text here; the registry decides whether it is
/// blank or unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    /// Election name.
    pub name: String,
    /// When the election takes place.
    pub date: DateTime<Utc>,
    /// Initial state: `scheduled`, `active` or `closed`.
    pub state: String,
}
