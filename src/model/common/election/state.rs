use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionState {
    /// Registered, not yet open for voting.
    #[serde(alias = "programada")]
    Scheduled,
    /// Open for voting.
    #[serde(alias = "activa")]
    Active,
    /// Finished, no more ballots accepted.
    #[serde(alias = "cerrada")]
    Closed,
}

impl ElectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The given string is not a known election state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl Display for UnknownState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown election state '{}', expected one of: scheduled, active, closed",
            self.0
        )
    }
}

impl std::error::Error for UnknownState {}

impl FromStr for ElectionState {
    type Err = UnknownState;

    /// Case-insensitive; the Spanish spellings sent by browser clients are
    /// accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" | "programada" => Ok(Self::Scheduled),
            "active" | "activa" => Ok(Self::Active),
            "closed" | "cerrada" => Ok(Self::Closed),
            _ => Err(UnknownState(s.to_string())),
        }
    }
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        Bson::String(state.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_states() {
        assert_eq!("active".parse(), Ok(ElectionState::Active));
        assert_eq!(" Active ".parse(), Ok(ElectionState::Active));
        assert_eq!("ACTIVA".parse(), Ok(ElectionState::Active));
        assert_eq!("programada".parse(), Ok(ElectionState::Scheduled));
        assert_eq!("closed".parse(), Ok(ElectionState::Closed));
        assert_eq!("cerrada".parse(), Ok(ElectionState::Closed));
        assert_eq!(
            "finished".parse::<ElectionState>(),
            Err(UnknownState("finished".to_string()))
        );
    }

    #[test]
    fn state_to_bson() {
        assert_eq!(Bson::from(ElectionState::Closed), Bson::String("closed".into()));
    }
}
