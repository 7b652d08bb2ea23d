use chrono::{SubsecRound, Utc};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{candidate::CandidateSpec, election::ElectionSpec, voter::VoterSpec, voter::VoterStats},
    common::{
        election::{CandidateId, ElectionId, ElectionState},
        policy::DatePolicy,
    },
    db::{
        candidate::Candidate,
        election::{Election, ElectionCore},
        voter::Voter,
    },
    mongodb::Id,
    store::{InsertOutcome, Store},
};

/// Reject blank text fields.
fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::invalid_input(format!("`{field}` must not be blank")))
    } else {
        Ok(())
    }
}

/// Creates and reads elections.
pub struct ElectionRegistry<'a> {
    store: &'a dyn Store,
    config: &'a Config,
}

impl<'a> ElectionRegistry<'a> {
    pub fn new(store: &'a dyn Store, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Register a new election and return its generated ID.
    pub async fn register(&self, spec: ElectionSpec) -> Result<ElectionId> {
        require("name", &spec.name)?;
        require("state", &spec.state)?;
        let state = spec
            .state
            .parse::<ElectionState>()
            .map_err(|e| Error::invalid_input(e.to_string()))?;
        if self.config.date_policy() == DatePolicy::FutureOnly && spec.date < Utc::now() {
            return Err(Error::invalid_input(format!(
                "Election date {} is in the past",
                spec.date
            )));
        }

        let election = Election {
            id: Id::new(),
            election: ElectionCore {
                name: spec.name,
                // Stores keep milliseconds at most.
                date: spec.date.trunc_subsecs(3),
                state,
            },
        };
        self.store.election_store().insert_election(&election).await?;

        // Read back what was written.
        if self.store.election_store().election(election.id).await?.is_none() {
            return Err(Error::Persistence(format!(
                "Election '{}' was not found after being written",
                election.id
            )));
        }
        info!("Registered {state} election '{}' ({})", election.name, election.id);
        Ok(election.id)
    }

    pub async fn get(&self, id: ElectionId) -> Result<Election> {
        self.store
            .election_store()
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election with ID '{id}'")))
    }

    /// All elections, by date then ID.
    pub async fn list(&self) -> Result<Vec<Election>> {
        let mut elections = self.store.election_store().elections().await?;
        elections.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(elections)
    }
}

/// Creates and reads election rosters.
pub struct CandidateRegistry<'a> {
    store: &'a dyn Store,
}

impl<'a> CandidateRegistry<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Add a candidate to an existing election and return its generated ID.
    pub async fn register(&self, election_id: ElectionId, spec: CandidateSpec) -> Result<CandidateId> {
        require("name", &spec.name)?;
        require("party", &spec.party)?;
        self.ensure_election_exists(election_id).await?;

        let candidate = Candidate {
            id: Id::new(),
            election_id,
            name: spec.name,
            party: spec.party,
        };
        self.store.candidate_store().insert_candidate(&candidate).await?;
        debug!(
            "Registered candidate '{}' ({}) in election {election_id}",
            candidate.name, candidate.id
        );
        Ok(candidate.id)
    }

    /// The roster of an existing election, by ID.
    pub async fn list(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        self.ensure_election_exists(election_id).await?;
        let mut candidates = self.store.candidate_store().candidates(election_id).await?;
        candidates.sort_by_key(|c| c.id);
        Ok(candidates)
    }

    async fn ensure_election_exists(&self, election_id: ElectionId) -> Result<()> {
        match self.store.election_store().election(election_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("Election with ID '{election_id}'"))),
        }
    }
}

/// Carnets that collide with fixed paths under `/voters`.
const RESERVED_CARNETS: &[&str] = &["stats"];

/// Creates and reads voters.
pub struct VoterRegistry<'a> {
    store: &'a dyn Store,
}

impl<'a> VoterRegistry<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Register a voter who has not voted yet. A carnet can only be registered once.
    pub async fn register(&self, spec: VoterSpec) -> Result<()> {
        require("carnet", &spec.carnet)?;
        require("name", &spec.name)?;
        if RESERVED_CARNETS.contains(&spec.carnet.as_str()) {
            return Err(Error::invalid_input(format!(
                "`{}` cannot be used as a carnet",
                spec.carnet
            )));
        }

        let voter = Voter::new(spec.carnet, spec.name);
        match self.store.voter_store().insert_voter(&voter).await? {
            InsertOutcome::Inserted => {
                debug!("Registered voter '{}'", voter.carnet);
                Ok(())
            }
            InsertOutcome::AlreadyExists => Err(Error::Conflict(format!(
                "Voter '{}' is already registered",
                voter.carnet
            ))),
        }
    }

    pub async fn get(&self, carnet: &str) -> Result<Voter> {
        self.store
            .voter_store()
            .voter(carnet)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with carnet '{carnet}'")))
    }

    /// Turnout across every registered voter.
    pub async fn stats(&self) -> Result<VoterStats> {
        let mut voters = self.store.voter_store().voters().await?;
        voters.sort_by(|a, b| a.carnet.cmp(&b.carnet));
        Ok(VoterStats::from_voters(voters))
    }
}
