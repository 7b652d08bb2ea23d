use serde::{Deserialize, Serialize};

/// Which election dates are acceptable at registration.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// The date must not be in the past.
    #[default]
    FutureOnly,
    /// Any date is accepted.
    Unrestricted,
}

/// How far a voter's single ballot reaches.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterScope {
    /// A voter casts one ballot ever; `has_voted` blocks every later election.
    #[default]
    Global,
    /// A voter casts one ballot per election; `has_voted` is still set but
    /// only the ledger's (election, voter) uniqueness decides.
    PerElection,
}
