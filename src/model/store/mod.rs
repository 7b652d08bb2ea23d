//! Storage interfaces shared by every backend.
//!
//! Components never reach for a global database session; they are handed a
//! [`StoreHandle`] and talk to it through the narrow per-table traits below.

use std::ops::Deref;
use std::sync::Arc;

use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        election::{CandidateId, ElectionId},
        policy::VoterScope,
    },
    db::{
        candidate::Candidate,
        election::Election,
        vote::{VoteRecord, VoteTally},
        voter::Voter,
    },
};

mod memory;

pub use memory::MemoryStore;

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    async fn insert_election(&self, election: &Election) -> Result<()>;

    async fn election(&self, id: ElectionId) -> Result<Option<Election>>;

    async fn elections(&self) -> Result<Vec<Election>>;
}

#[rocket::async_trait]
pub trait CandidateStore: Send + Sync {
    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()>;

    /// The roster of the given election.
    async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>>;
}

/// Outcome of inserting a record under a natural key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

#[rocket::async_trait]
pub trait VoterStore: Send + Sync {
    /// Insert a voter, refusing to overwrite an existing carnet.
    async fn insert_voter(&self, voter: &Voter) -> Result<InsertOutcome>;

    async fn voter(&self, carnet: &str) -> Result<Option<Voter>>;

    async fn voters(&self) -> Result<Vec<Voter>>;
}

/// Outcome of the grouped ledger + voter flag write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The ballot was appended and the voter flagged.
    Recorded,
    /// Nothing was written: the voter had already voted.
    AlreadyVoted,
    /// Nothing was written: a ballot already exists for (election, voter).
    DuplicateVote,
}

#[rocket::async_trait]
pub trait VoteLedger: Send + Sync {
    async fn vote(&self, election_id: ElectionId, voter_id: &str) -> Result<Option<VoteRecord>>;

    /// Append `record` and set the voter's `has_voted` flag as one conditional write.
    ///
    /// The ballot is appended only if no ballot exists for its (election, voter),
    /// and, under [`VoterScope::Global`], only if the voter's flag is still unset.
    /// Of any number of concurrent callers for the same voter, at most one gets
    /// [`RecordOutcome::Recorded`].
    async fn record_vote(&self, record: &VoteRecord, scope: VoterScope) -> Result<RecordOutcome>;

    async fn votes(&self, election_id: ElectionId) -> Result<Vec<VoteRecord>>;
}

#[rocket::async_trait]
pub trait TallyStore: Send + Sync {
    /// Add `by` to the tally, creating it at zero first if needed.
    async fn increment(&self, election_id: ElectionId, candidate_id: CandidateId, by: i64)
        -> Result<()>;

    async fn tallies(&self, election_id: ElectionId) -> Result<Vec<VoteTally>>;
}

/// The voter behind a validated ballot was gone by the time it was written.
pub(crate) fn voter_vanished(voter_id: &str) -> Error {
    Error::Persistence(format!(
        "Voter '{voter_id}' vanished before their ballot was recorded"
    ))
}

/// A complete backend: all five tables.
pub trait Store: Send + Sync {
    fn election_store(&self) -> &dyn ElectionStore;
    fn candidate_store(&self) -> &dyn CandidateStore;
    fn voter_store(&self) -> &dyn VoterStore;
    fn ledger(&self) -> &dyn VoteLedger;
    fn tally_store(&self) -> &dyn TallyStore;
}

impl<T> Store for T
where
    T: ElectionStore + CandidateStore + VoterStore + VoteLedger + TallyStore,
{
    fn election_store(&self) -> &dyn ElectionStore {
        self
    }

    fn candidate_store(&self) -> &dyn CandidateStore {
        self
    }

    fn voter_store(&self) -> &dyn VoterStore {
        self
    }

    fn ledger(&self) -> &dyn VoteLedger {
        self
    }

    fn tally_store(&self) -> &dyn TallyStore {
        self
    }
}

/// A shareable handle on whichever backend is configured.
#[derive(Clone)]
pub struct StoreHandle(Arc<dyn Store>);

impl StoreHandle {
    pub fn new(store: impl Store + 'static) -> Self {
        Self(Arc::new(store))
    }
}

impl Deref for StoreHandle {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl From<MemoryStore> for StoreHandle {
    fn from(store: MemoryStore) -> Self {
        Self::new(store)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StoreHandle {
    type Error = ();

    /// Get the store from the managed state.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<StoreHandle>>().await {
            request::Outcome::Success(store) => request::Outcome::Success(store.inner().clone()),
            _ => {
                error!("No store is managed; was the store fairing attached?");
                request::Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}
