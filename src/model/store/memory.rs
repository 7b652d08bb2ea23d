use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        election::{CandidateId, ElectionId, VoterId},
        policy::VoterScope,
    },
    db::{
        candidate::Candidate,
        election::Election,
        vote::{VoteRecord, VoteTally},
        voter::Voter,
    },
};

use super::{
    voter_vanished, CandidateStore, ElectionStore, InsertOutcome, RecordOutcome, TallyStore,
    VoteLedger, VoterStore,
};

#[derive(Default)]
struct Tables {
    elections: Mutex<BTreeMap<ElectionId, Election>>,
    candidates: Mutex<BTreeMap<(ElectionId, CandidateId), Candidate>>,
    voters: Mutex<BTreeMap<VoterId, Voter>>,
    ledger: Mutex<BTreeMap<(ElectionId, VoterId), VoteRecord>>,
    tallies: Mutex<BTreeMap<(ElectionId, CandidateId), i64>>,
    /// Number of upcoming tally writes that should fail.
    failing_tally_writes: AtomicU32,
    /// Number of upcoming vote writes that should fail.
    failing_vote_writes: AtomicU32,
    /// Number of upcoming election writes to acknowledge and then drop.
    lost_election_writes: AtomicU32,
}

/// A process-local store, for development and tests.
///
/// Each table has its own lock, so the tables are as independent as the
/// collections of a real database. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` tally writes fail with a persistence error.
    pub fn fail_tally_writes(&self, count: u32) {
        self.tables
            .failing_tally_writes
            .store(count, Ordering::SeqCst);
    }

    /// Make the next `count` vote writes fail with a persistence error,
    /// before anything is written.
    pub fn fail_vote_writes(&self, count: u32) {
        self.tables
            .failing_vote_writes
            .store(count, Ordering::SeqCst);
    }

    /// Make the next `count` election writes report success without
    /// storing anything.
    pub fn lose_election_writes(&self, count: u32) {
        self.tables
            .lost_election_writes
            .store(count, Ordering::SeqCst);
    }
}

/// Use up one injected fault, if any are left.
fn take_fault(faults: &AtomicU32) -> bool {
    faults
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn insert_election(&self, election: &Election) -> Result<()> {
        let mut elections = self.tables.elections.lock().await;
        if elections.contains_key(&election.id) {
            return Err(Error::Conflict(format!(
                "Election with ID '{}' already exists",
                election.id
            )));
        }
        if take_fault(&self.tables.lost_election_writes) {
            return Ok(());
        }
        elections.insert(election.id, election.clone());
        Ok(())
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.tables.elections.lock().await.get(&id).cloned())
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        Ok(self.tables.elections.lock().await.values().cloned().collect())
    }
}

#[rocket::async_trait]
impl CandidateStore for MemoryStore {
    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.tables
            .candidates
            .lock()
            .await
            .insert((candidate.election_id, candidate.id), candidate.clone());
        Ok(())
    }

    async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        Ok(self
            .tables
            .candidates
            .lock()
            .await
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }
}

#[rocket::async_trait]
impl VoterStore for MemoryStore {
    async fn insert_voter(&self, voter: &Voter) -> Result<InsertOutcome> {
        let mut voters = self.tables.voters.lock().await;
        if voters.contains_key(&voter.carnet) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        voters.insert(voter.carnet.clone(), voter.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn voter(&self, carnet: &str) -> Result<Option<Voter>> {
        Ok(self.tables.voters.lock().await.get(carnet).cloned())
    }

    async fn voters(&self) -> Result<Vec<Voter>> {
        Ok(self.tables.voters.lock().await.values().cloned().collect())
    }
}

#[rocket::async_trait]
impl VoteLedger for MemoryStore {
    async fn vote(&self, election_id: ElectionId, voter_id: &str) -> Result<Option<VoteRecord>> {
        Ok(self
            .tables
            .ledger
            .lock()
            .await
            .get(&(election_id, voter_id.to_string()))
            .cloned())
    }

    async fn record_vote(&self, record: &VoteRecord, scope: VoterScope) -> Result<RecordOutcome> {
        if take_fault(&self.tables.failing_vote_writes) {
            return Err(Error::Persistence(format!(
                "Ballot of voter '{}' in election '{}' could not be written",
                record.voter_id, record.election_id
            )));
        }

        // Lock order: voters, then ledger.
        let mut voters = self.tables.voters.lock().await;
        let mut ledger = self.tables.ledger.lock().await;

        let voter = voters
            .get_mut(&record.voter_id)
            .ok_or_else(|| voter_vanished(&record.voter_id))?;
        if scope == VoterScope::Global && voter.has_voted {
            return Ok(RecordOutcome::AlreadyVoted);
        }
        let key = (record.election_id, record.voter_id.clone());
        if ledger.contains_key(&key) {
            return Ok(RecordOutcome::DuplicateVote);
        }

        ledger.insert(key, record.clone());
        voter.has_voted = true;
        Ok(RecordOutcome::Recorded)
    }

    async fn votes(&self, election_id: ElectionId) -> Result<Vec<VoteRecord>> {
        Ok(self
            .tables
            .ledger
            .lock()
            .await
            .values()
            .filter(|r| r.election_id == election_id)
            .cloned()
            .collect())
    }
}

#[rocket::async_trait]
impl TallyStore for MemoryStore {
    async fn increment(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
        by: i64,
    ) -> Result<()> {
        if take_fault(&self.tables.failing_tally_writes) {
            return Err(Error::Persistence(format!(
                "Tally write for candidate '{candidate_id}' in election '{election_id}' failed"
            )));
        }
        *self
            .tables
            .tallies
            .lock()
            .await
            .entry((election_id, candidate_id))
            .or_insert(0) += by;
        Ok(())
    }

    async fn tallies(&self, election_id: ElectionId) -> Result<Vec<VoteTally>> {
        Ok(self
            .tables
            .tallies
            .lock()
            .await
            .iter()
            .filter(|((e, _), _)| *e == election_id)
            .map(|(&(election_id, candidate_id), &votes)| VoteTally {
                election_id,
                candidate_id,
                votes,
            })
            .collect())
    }
}
