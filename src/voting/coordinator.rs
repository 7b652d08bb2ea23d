use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use rand::Rng;
use rocket::tokio::time::sleep;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result, VoteError};
use crate::model::{
    common::{
        election::{CandidateId, ElectionId},
        policy::VoterScope,
    },
    db::vote::VoteRecord,
    store::{RecordOutcome, Store},
};

/// Where a ballot is on its way to being counted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VoteStage {
    /// Checking the voter, election and candidate.
    Validating,
    /// All checks passed; nothing written yet.
    Authorized,
    /// Writing the ballot and the voter's flag.
    Recording,
    /// The ballot is recorded; incrementing the tally.
    Tallying,
    Committed,
    Failed,
}

impl Display for VoteStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Self::Validating => "validating",
            Self::Authorized => "authorized",
            Self::Recording => "recording",
            Self::Tallying => "tallying",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(stage)
    }
}

/// Tracks and logs the stage of one ballot.
struct Progress<'v> {
    election_id: ElectionId,
    voter_id: &'v str,
    stage: VoteStage,
}

impl<'v> Progress<'v> {
    fn new(election_id: ElectionId, voter_id: &'v str) -> Self {
        debug!("Ballot of '{voter_id}' in election {election_id}: {}", VoteStage::Validating);
        Self {
            election_id,
            voter_id,
            stage: VoteStage::Validating,
        }
    }

    fn advance(&mut self, next: VoteStage) {
        debug!(
            "Ballot of '{}' in election {}: {} -> {next}",
            self.voter_id, self.election_id, self.stage
        );
        self.stage = next;
    }

    fn fail(&mut self, err: &Error) {
        let msg = format!(
            "Ballot of '{}' in election {} failed while {}: {err}",
            self.voter_id, self.election_id, self.stage
        );
        match err.kind() {
            ErrorKind::Persistence | ErrorKind::PartialFailure => error!("{msg}"),
            _ => warn!("{msg}"),
        }
        self.stage = VoteStage::Failed;
    }
}

/// A ballot that was recorded and counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub record: VoteRecord,
    /// How many tally writes it took.
    pub tally_attempts: u32,
}

/// Validates ballots and drives them through the ledger and the tally.
pub struct VoteCoordinator<'a> {
    store: &'a dyn Store,
    config: &'a Config,
}

impl<'a> VoteCoordinator<'a> {
    pub fn new(store: &'a dyn Store, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Cast the ballot of `voter_id` for `candidate_id` in `election_id`.
    ///
    /// Refused ballots write nothing. A ballot whose tally could not be
    /// incremented stays recorded and is reported as
    /// [`VoteError::TallyNotRecorded`].
    pub async fn cast_vote(
        &self,
        election_id: ElectionId,
        voter_id: &str,
        candidate_id: CandidateId,
    ) -> Result<Committed> {
        let mut progress = Progress::new(election_id, voter_id);
        match self.run(&mut progress, candidate_id).await {
            Ok(committed) => {
                info!("Vote of '{voter_id}' in election {election_id} committed");
                Ok(committed)
            }
            Err(err) => {
                progress.fail(&err);
                Err(err)
            }
        }
    }

    async fn run(&self, progress: &mut Progress<'_>, candidate_id: CandidateId) -> Result<Committed> {
        let (election_id, voter_id) = (progress.election_id, progress.voter_id);
        let scope = self.config.voter_scope();

        // 1. The voter.
        let voter = self
            .store
            .voter_store()
            .voter(voter_id)
            .await?
            .ok_or_else(|| VoteError::VoterNotFound(voter_id.to_string()))?;
        if scope == VoterScope::Global && voter.has_voted {
            return Err(VoteError::AlreadyVoted(voter.carnet).into());
        }

        // 2. The election.
        let election = self
            .store
            .election_store()
            .election(election_id)
            .await?
            .ok_or(VoteError::ElectionNotFound(election_id))?;
        if !election.is_active() {
            return Err(VoteError::ElectionNotActive {
                election_id,
                state: election.state,
            }
            .into());
        }

        // 3. The candidate.
        let roster = self.store.candidate_store().candidates(election_id).await?;
        if !roster.iter().any(|c| c.id == candidate_id) {
            return Err(VoteError::InvalidCandidate {
                election_id,
                candidate_id,
            }
            .into());
        }

        // 4. Fast path for repeat ballots; the conditional write below decides.
        if self.store.ledger().vote(election_id, voter_id).await?.is_some() {
            return Err(duplicate(election_id, voter_id));
        }
        progress.advance(VoteStage::Authorized);

        // 5. Ledger and flag, together.
        progress.advance(VoteStage::Recording);
        let record = VoteRecord {
            election_id,
            voter_id: voter_id.to_string(),
            candidate_id,
            cast_at: Utc::now().trunc_subsecs(3),
        };
        match self.store.ledger().record_vote(&record, scope).await? {
            RecordOutcome::Recorded => {}
            RecordOutcome::AlreadyVoted => {
                return Err(VoteError::AlreadyVoted(voter_id.to_string()).into())
            }
            RecordOutcome::DuplicateVote => return Err(duplicate(election_id, voter_id)),
        }

        // 6. The tally, separately.
        progress.advance(VoteStage::Tallying);
        let tally_attempts = self.increment_tally(&record).await?;
        progress.advance(VoteStage::Committed);

        Ok(Committed {
            record,
            tally_attempts,
        })
    }

    /// Increment the tally for a recorded ballot, retrying with linear backoff.
    /// Returns the number of attempts used.
    async fn increment_tally(&self, record: &VoteRecord) -> Result<u32> {
        let attempts = self.config.tally_attempts();
        let backoff = self.config.tally_backoff();
        for attempt in 1..=attempts {
            match self
                .store
                .tally_store()
                .increment(record.election_id, record.candidate_id, 1)
                .await
            {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    warn!(
                        "Tally increment for candidate {} in election {} failed (attempt {attempt}/{attempts}): {e}",
                        record.candidate_id, record.election_id
                    );
                    if attempt < attempts {
                        let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                        let delay = backoff.saturating_mul(attempt);
                        sleep(delay.saturating_add(Duration::from_millis(jitter_ms))).await;
                    }
                }
            }
        }

        Err(VoteError::TallyNotRecorded {
            election_id: record.election_id,
            voter_id: record.voter_id.clone(),
            candidate_id: record.candidate_id,
            attempts,
        }
        .into())
    }
}

fn duplicate(election_id: ElectionId, voter_id: &str) -> Error {
    VoteError::DuplicateVote {
        election_id,
        voter_id: voter_id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::futures::future::join_all;

    use crate::model::{
        api::{election::ElectionSpec, voter::VoterSpec},
        common::policy::VoterScope,
        mongodb::Id,
    };
    use crate::voting::{examples::Polls, ElectionRegistry, TallyAggregator, VoterRegistry};

    /// Assert that `result` failed with the given vote error.
    macro_rules! assert_vote_error {
        ($result:expr, $pattern:pat) => {
            match $result {
                Err(Error::Vote($pattern)) => {}
                other => panic!("expected {}, got {other:?}", stringify!($pattern)),
            }
        };
    }

    #[rocket::async_test]
    async fn a_voter_votes_once() {
        let polls = Polls::open(Config::example()).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        let [c1, c2] = polls.candidates;

        let committed = coordinator.cast_vote(polls.election, "EST001", c1).await.unwrap();
        assert_eq!(committed.record.candidate_id, c1);
        assert_eq!(committed.tally_attempts, 1);

        assert_vote_error!(
            coordinator.cast_vote(polls.election, "EST001", c2).await,
            VoteError::AlreadyVoted(_)
        );
        assert_eq!(polls.ballots().await, 1);
        assert_eq!(polls.tally_sum().await, 1);
    }

    #[rocket::async_test]
    async fn unknown_voters_are_refused() {
        let polls = Polls::open(Config::example()).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);

        assert_vote_error!(
            coordinator
                .cast_vote(polls.election, "UNKNOWN", polls.candidates[0])
                .await,
            VoteError::VoterNotFound(_)
        );
        assert_eq!(polls.ballots().await, 0);
    }

    #[rocket::async_test]
    async fn inactive_elections_are_refused() {
        let polls = Polls::open(Config::example()).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        let elections = ElectionRegistry::new(&polls.store, &polls.config);

        for state in ["closed", "scheduled"] {
            let election = elections
                .register(ElectionSpec::with_state(state))
                .await
                .unwrap();
            assert_vote_error!(
                coordinator
                    .cast_vote(election, "EST001", polls.candidates[0])
                    .await,
                VoteError::ElectionNotActive { .. }
            );
        }
        assert_vote_error!(
            coordinator
                .cast_vote(Id::new(), "EST001", polls.candidates[0])
                .await,
            VoteError::ElectionNotFound(_)
        );

        // Nothing was written, so the voter can still vote.
        assert!(!polls.store.voter_store().voter("EST001").await.unwrap().unwrap().has_voted);
        coordinator
            .cast_vote(polls.election, "EST001", polls.candidates[0])
            .await
            .unwrap();
    }

    #[rocket::async_test]
    async fn candidates_must_be_on_the_roster() {
        let polls = Polls::open(Config::example()).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);

        assert_vote_error!(
            coordinator.cast_vote(polls.election, "EST001", Id::new()).await,
            VoteError::InvalidCandidate { .. }
        );
        assert_eq!(polls.ballots().await, 0);
    }

    #[rocket::async_test]
    async fn global_scope_spans_elections() {
        let polls = Polls::open(Config::example()).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        let other = polls.another_election().await;

        coordinator
            .cast_vote(polls.election, "EST001", polls.candidates[0])
            .await
            .unwrap();
        assert_vote_error!(
            coordinator.cast_vote(other.0, "EST001", other.1).await,
            VoteError::AlreadyVoted(_)
        );
    }

    #[rocket::async_test]
    async fn per_election_scope_allows_one_ballot_per_election() {
        let config = Config::example().with_voter_scope(VoterScope::PerElection);
        let polls = Polls::open(config).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        let other = polls.another_election().await;

        coordinator
            .cast_vote(polls.election, "EST001", polls.candidates[0])
            .await
            .unwrap();
        coordinator.cast_vote(other.0, "EST001", other.1).await.unwrap();

        assert_vote_error!(
            coordinator
                .cast_vote(polls.election, "EST001", polls.candidates[1])
                .await,
            VoteError::DuplicateVote { .. }
        );
        assert!(polls.store.voter_store().voter("EST001").await.unwrap().unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn concurrent_ballots_have_one_winner() {
        for scope in [VoterScope::Global, VoterScope::PerElection] {
            let polls = Polls::open(Config::example().with_voter_scope(scope)).await;

            let attempts = (0..16).map(|i| {
                let store = polls.store.clone();
                let config = polls.config.clone();
                let (election, candidate) = (polls.election, polls.candidates[i % 2]);
                rocket::tokio::spawn(async move {
                    VoteCoordinator::new(&store, &config)
                        .cast_vote(election, "EST001", candidate)
                        .await
                        .map_err(|e| e.kind())
                })
            });
            let outcomes: Vec<_> = join_all(attempts)
                .await
                .into_iter()
                .map(|joined| joined.unwrap())
                .collect();

            let successes = outcomes.iter().filter(|o| o.is_ok()).count();
            assert_eq!(successes, 1, "{scope:?}");
            assert!(outcomes
                .iter()
                .filter_map(|o| o.as_ref().err())
                .all(|kind| *kind == ErrorKind::State));
            assert_eq!(polls.ballots().await, 1);
            assert_eq!(polls.tally_sum().await, 1);
        }
    }

    #[rocket::async_test]
    async fn tallies_match_the_ledger() {
        let polls = Polls::open(Config::example()).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        let voters = VoterRegistry::new(&polls.store);

        for i in 0..9 {
            let carnet = format!("EST1{i:02}");
            voters.register(VoterSpec::example(&carnet, "Voter")).await.unwrap();
            coordinator
                .cast_vote(polls.election, &carnet, polls.candidates[i % 2])
                .await
                .unwrap();
        }

        assert_eq!(polls.ballots().await, 9);
        assert_eq!(polls.tally_sum().await, 9);
        let results = TallyAggregator::new(&polls.store)
            .results(polls.election)
            .await
            .unwrap();
        assert_eq!(results[0].votes, 5);
        assert_eq!(results[1].votes, 4);
    }

    #[rocket::async_test]
    async fn ledger_write_failures_surface_at_once() {
        let polls = Polls::open(Config::example()).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        polls.store.fail_vote_writes(1);

        let err = coordinator
            .cast_vote(polls.election, "EST001", polls.candidates[0])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(polls.ballots().await, 0);
        assert_eq!(polls.tally_sum().await, 0);
        assert!(!polls.store.voter_store().voter("EST001").await.unwrap().unwrap().has_voted);

        // Nothing was written, so the ballot can be cast again.
        coordinator
            .cast_vote(polls.election, "EST001", polls.candidates[0])
            .await
            .unwrap();
        assert_eq!(polls.tally_sum().await, 1);
    }

    #[rocket::async_test]
    async fn transient_tally_failures_are_retried() {
        let polls = Polls::open(Config::example().with_tally_attempts(3)).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        polls.store.fail_tally_writes(2);

        let committed = coordinator
            .cast_vote(polls.election, "EST001", polls.candidates[0])
            .await
            .unwrap();
        assert_eq!(committed.tally_attempts, 3);
        assert_eq!(polls.tally_sum().await, 1);
    }

    #[rocket::async_test]
    async fn exhausted_tally_retries_are_a_partial_failure() {
        let polls = Polls::open(Config::example().with_tally_attempts(2)).await;
        let coordinator = VoteCoordinator::new(&polls.store, &polls.config);
        polls.store.fail_tally_writes(2);

        let result = coordinator
            .cast_vote(polls.election, "EST001", polls.candidates[0])
            .await;
        assert_vote_error!(result, VoteError::TallyNotRecorded { attempts: 2, .. });

        // The ballot stands.
        assert_eq!(polls.ballots().await, 1);
        assert_eq!(polls.tally_sum().await, 0);
        assert_vote_error!(
            coordinator
                .cast_vote(polls.election, "EST001", polls.candidates[0])
                .await,
            VoteError::AlreadyVoted(_)
        );

        let report = TallyAggregator::new(&polls.store)
            .reconcile(polls.election)
            .await
            .unwrap();
        assert!(report.repaired());
        assert_eq!(polls.tally_sum().await, 1);
    }
}
