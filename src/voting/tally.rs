use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{CandidateResult, ReconcileReport, TallyAdjustment},
    common::election::{CandidateId, ElectionId},
    store::Store,
};

/// Tallies are only ever incremented, so a negative count can only come
/// from outside this crate.
fn as_count(votes: i64) -> u64 {
    u64::try_from(votes).unwrap_or(0)
}

/// The read path over the tallies, and their repair.
pub struct TallyAggregator<'a> {
    store: &'a dyn Store,
}

impl<'a> TallyAggregator<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Every candidate on the roster with their current tally, most votes
    /// first. Ties go to the lower candidate ID.
    pub async fn results(&self, election_id: ElectionId) -> Result<Vec<CandidateResult>> {
        self.ensure_election_exists(election_id).await?;
        let roster = self.store.candidate_store().candidates(election_id).await?;
        let mut tallies = self.tallies(election_id).await?;

        let mut results: Vec<_> = roster
            .into_iter()
            .map(|candidate| {
                let votes = tallies.remove(&candidate.id).unwrap_or(0);
                CandidateResult::new(candidate, votes)
            })
            .collect();
        for (candidate_id, votes) in tallies {
            warn!("Ignoring tally of {votes} for candidate {candidate_id}, who is not running in election {election_id}");
        }

        results.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        Ok(results)
    }

    /// Recount the ledger and raise any tally that fell behind it.
    ///
    /// Tallies are never lowered; one that is ahead of the ledger is only
    /// reported. Votes in flight while this runs may be counted twice, so it
    /// is meant for elections that are closed or quiet.
    pub async fn reconcile(&self, election_id: ElectionId) -> Result<ReconcileReport> {
        self.ensure_election_exists(election_id).await?;
        let ballots = self.store.ledger().votes(election_id).await?;
        let tallies = self.tallies(election_id).await?;
        let roster = self.store.candidate_store().candidates(election_id).await?;

        let mut counted: BTreeMap<CandidateId, u64> = BTreeMap::new();
        for ballot in &ballots {
            *counted.entry(ballot.candidate_id).or_default() += 1;
        }

        let candidates: BTreeSet<CandidateId> = roster
            .iter()
            .map(|c| c.id)
            .chain(counted.keys().copied())
            .chain(tallies.keys().copied())
            .collect();

        let mut adjustments = Vec::with_capacity(candidates.len());
        for candidate_id in candidates {
            let ledger_votes = counted.get(&candidate_id).copied().unwrap_or(0);
            let tally_votes = tallies.get(&candidate_id).copied().unwrap_or(0);
            let mut incremented_by = 0;
            if ledger_votes > tally_votes {
                incremented_by = ledger_votes - tally_votes;
                let by = i64::try_from(incremented_by).map_err(|_| {
                    Error::Persistence(format!("Tally gap of {incremented_by} is too large"))
                })?;
                self.store
                    .tally_store()
                    .increment(election_id, candidate_id, by)
                    .await?;
                info!(
                    "Raised tally of candidate {candidate_id} in election {election_id} \
from {tally_votes} to {ledger_votes}"
                );
            } else if tally_votes > ledger_votes {
                warn!(
                    "Tally of candidate {candidate_id} in election {election_id} is {tally_votes}, \
ahead of {ledger_votes} recorded ballots; leaving it as is"
                );
            }
            adjustments.push(TallyAdjustment {
                candidate_id: candidate_id.into(),
                ledger_votes,
                tally_votes,
                incremented_by,
            });
        }

        Ok(ReconcileReport {
            election_id: election_id.into(),
            ballots: ballots.len() as u64,
            adjustments,
        })
    }

    async fn tallies(&self, election_id: ElectionId) -> Result<BTreeMap<CandidateId, u64>> {
        Ok(self
            .store
            .tally_store()
            .tallies(election_id)
            .await?
            .into_iter()
            .map(|t| (t.candidate_id, as_count(t.votes)))
            .collect())
    }

    async fn ensure_election_exists(&self, election_id: ElectionId) -> Result<()> {
        match self.store.election_store().election(election_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("Election with ID '{election_id}'"))),
        }
    }
}
