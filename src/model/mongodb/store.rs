use mongodb::{
    bson::{doc, Document},
    error::{Error as DbError, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::UpdateOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

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
    store::{
        voter_vanished, CandidateStore, ElectionStore, InsertOutcome, RecordOutcome, TallyStore,
        VoteLedger, VoterStore,
    },
};

use super::{
    errors::{is_duplicate_key_error, is_transient_transaction_error},
    Coll,
};

/// How many times a vote transaction is attempted before giving up.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// The MongoDB backend.
///
/// Recording a vote uses a multi-document transaction, so the deployment must
/// be a replica set (a single-node one is fine).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    voters: Coll<Voter>,
    votes: Coll<VoteRecord>,
    tallies: Coll<VoteTally>,
}

impl MongoStore {
    /// Wrap an existing connection.
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            voters: Coll::from_db(db),
            votes: Coll::from_db(db),
            tallies: Coll::from_db(db),
        }
    }

    /// Connect to the given deployment and make sure the indexes the store
    /// relies on exist.
    pub async fn connect(uri: &str, db_name: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        super::ensure_indexes_exist(&db).await?;
        Ok(Self::new(client, &db))
    }

    /// The conditional writes of a vote, inside an already-started transaction.
    /// `None` means the voter does not exist.
    async fn record_vote_in(
        &self,
        session: &mut ClientSession,
        record: &VoteRecord,
        scope: VoterScope,
    ) -> std::result::Result<Option<RecordOutcome>, DbError> {
        let flag = doc! {
            "$set": { "has_voted": true }
        };
        let result = self
            .voters
            .update_one_with_session(voter_filter(&record.voter_id, scope), flag, None, session)
            .await?;
        if result.matched_count == 0 {
            if scope == VoterScope::PerElection {
                return Ok(None);
            }
            // Either the flag was already set, or there is no such voter.
            let voter = self
                .voters
                .find_one_with_session(doc! { "_id": record.voter_id.as_str() }, None, session)
                .await?;
            return Ok(voter.map(|_| RecordOutcome::AlreadyVoted));
        }

        match self
            .votes
            .insert_one_with_session(record, None, session)
            .await
        {
            Ok(_) => Ok(Some(RecordOutcome::Recorded)),
            Err(e) if is_duplicate_key_error(&e) => Ok(Some(RecordOutcome::DuplicateVote)),
            Err(e) => Err(e),
        }
    }
}

/// The voters a ballot may flag. Under [`VoterScope::Global`] the voter must
/// not have voted yet.
fn voter_filter(voter_id: &str, scope: VoterScope) -> Document {
    match scope {
        VoterScope::Global => doc! {
            "_id": voter_id,
            "has_voted": false,
        },
        VoterScope::PerElection => doc! {
            "_id": voter_id,
        },
    }
}

/// Commit, retrying while the outcome of the commit itself is unknown.
async fn commit(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_TRANSACTION_ATTEMPTS =>
            {
                warn!("Vote commit result unknown, retrying commit: {e}");
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Abort a transaction whose outcome no longer matters.
/// The server may already have aborted it, so errors are only logged.
async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        debug!("Ignoring error while aborting vote transaction: {e}");
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn insert_election(&self, election: &Election) -> Result<()> {
        match self.elections.insert_one(election, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::Conflict(format!(
                "Election with ID '{}' already exists",
                election.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        Ok(self.elections.find(None, None).await?.try_collect().await?)
    }
}

#[rocket::async_trait]
impl CandidateStore for MongoStore {
    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.candidates.insert_one(candidate, None).await?;
        Ok(())
    }

    async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        let filter = doc! {
            "election_id": election_id,
        };
        Ok(self.candidates.find(filter, None).await?.try_collect().await?)
    }
}

#[rocket::async_trait]
impl VoterStore for MongoStore {
    async fn insert_voter(&self, voter: &Voter) -> Result<InsertOutcome> {
        match self.voters.insert_one(voter, None).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key_error(&e) => Ok(InsertOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn voter(&self, carnet: &str) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(doc! { "_id": carnet }, None).await?)
    }

    async fn voters(&self) -> Result<Vec<Voter>> {
        Ok(self.voters.find(None, None).await?.try_collect().await?)
    }
}

#[rocket::async_trait]
impl VoteLedger for MongoStore {
    async fn vote(&self, election_id: ElectionId, voter_id: &str) -> Result<Option<VoteRecord>> {
        let filter = doc! {
            "election_id": election_id,
            "voter_id": voter_id,
        };
        Ok(self.votes.find_one(filter, None).await?)
    }

    async fn record_vote(&self, record: &VoteRecord, scope: VoterScope) -> Result<RecordOutcome> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            let error = match self.record_vote_in(&mut session, record, scope).await {
                Ok(Some(RecordOutcome::Recorded)) => match commit(&mut session).await {
                    Ok(()) => return Ok(RecordOutcome::Recorded),
                    Err(e) => e,
                },
                Ok(Some(refused)) => {
                    abort(&mut session).await;
                    return Ok(refused);
                }
                Ok(None) => {
                    abort(&mut session).await;
                    return Err(voter_vanished(&record.voter_id));
                }
                Err(e) => {
                    abort(&mut session).await;
                    e
                }
            };

            // Concurrent votes by the same voter conflict on the voter document;
            // the loser retries and then sees the flag already set.
            if !is_transient_transaction_error(&error) || attempt >= MAX_TRANSACTION_ATTEMPTS {
                return Err(error.into());
            }
            debug!(
                "Vote transaction for voter '{}' hit a transient error (attempt {attempt}): {error}",
                record.voter_id
            );
            attempt += 1;
        }
    }

    async fn votes(&self, election_id: ElectionId) -> Result<Vec<VoteRecord>> {
        let filter = doc! {
            "election_id": election_id,
        };
        Ok(self.votes.find(filter, None).await?.try_collect().await?)
    }
}

#[rocket::async_trait]
impl TallyStore for MongoStore {
    async fn increment(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
        by: i64,
    ) -> Result<()> {
        let filter = doc! {
            "election_id": election_id,
            "candidate_id": candidate_id,
        };
        let update = doc! {
            "$inc": { "votes": by }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        self.tallies.update_one(filter, update, options).await?;
        Ok(())
    }

    async fn tallies(&self, election_id: ElectionId) -> Result<Vec<VoteTally>> {
        let filter = doc! {
            "election_id": election_id,
        };
        Ok(self.tallies.find(filter, None).await?.try_collect().await?)
    }
}
