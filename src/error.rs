use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::common::election::{CandidateId, ElectionId, ElectionState, VoterId};

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error categories, as reported to API clients.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Blank or malformed input.
    Validation,
    /// A referenced voter, election or candidate does not exist.
    NotFound,
    /// The request conflicts with the current state of the data.
    State,
    /// The underlying store failed.
    Persistence,
    /// The ballot was recorded but its tally was not.
    PartialFailure,
}

impl ErrorKind {
    pub fn status(self) -> Status {
        match self {
            Self::Validation => Status::BadRequest,
            Self::NotFound => Status::NotFound,
            Self::State => Status::Conflict,
            Self::Persistence | Self::PartialFailure => Status::InternalServerError,
        }
    }
}

/// Reasons a ballot can be refused or left half-written.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Voter '{0}' is not registered")]
    VoterNotFound(VoterId),
    #[error("Voter '{0}' has already voted")]
    AlreadyVoted(VoterId),
    #[error("Election '{0}' does not exist")]
    ElectionNotFound(ElectionId),
    #[error("Election '{election_id}' is not active (current state: {state})")]
    ElectionNotActive {
        election_id: ElectionId,
        state: ElectionState,
    },
    #[error("Candidate '{candidate_id}' is not running in election '{election_id}'")]
    InvalidCandidate {
        election_id: ElectionId,
        candidate_id: CandidateId,
    },
    #[error("Voter '{voter_id}' already has a ballot in election '{election_id}'")]
    DuplicateVote {
        election_id: ElectionId,
        voter_id: VoterId,
    },
    #[error(
        "Ballot of voter '{voter_id}' was recorded, but the tally of candidate '{candidate_id}' \
in election '{election_id}' was not incremented after {attempts} attempts"
    )]
    TallyNotRecorded {
        election_id: ElectionId,
        voter_id: VoterId,
        candidate_id: CandidateId,
        attempts: u32,
    },
}

impl VoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VoterNotFound(_) | Self::ElectionNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyVoted(_)
            | Self::ElectionNotActive { .. }
            | Self::InvalidCandidate { .. }
            | Self::DuplicateVote { .. } => ErrorKind::State,
            Self::TallyNotRecorded { .. } => ErrorKind::PartialFailure,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) | Self::Persistence(_) => ErrorKind::Persistence,
            Self::Vote(err) => err.kind(),
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::State,
        }
    }

    /// The vote error, if this is one.
    pub fn as_vote_error(&self) -> Option<&VoteError> {
        match self {
            Self::Vote(err) => Some(err),
            _ => None,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let kind = self.kind();
        let status = kind.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => debug!("{self}"),
        }
        let body = ErrorBody {
            kind,
            message: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}
