use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    candidate::Candidate,
    election::Election,
    vote::{VoteRecord, VoteTally},
    voter::Voter,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for Voter {
    const NAME: &'static str = "voters";
}

impl MongoCollection for VoteRecord {
    const NAME: &'static str = "votes";
}

impl MongoCollection for VoteTally {
    const NAME: &'static str = "vote_tallies";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Candidate collection: rosters are always read per election.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Vote ledger: at most one ballot per voter per election.
    let vote_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_id": 1})
        .options(unique.clone())
        .build();
    Coll::<VoteRecord>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Tallies: one counter per candidate per election.
    let tally_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "candidate_id": 1})
        .options(unique)
        .build();
    Coll::<VoteTally>::from_db(db)
        .create_index(tally_index, None)
        .await?;

    Ok(())
}
