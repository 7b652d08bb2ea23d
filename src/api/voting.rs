use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        ballot::BallotSpec,
        election::{CandidateResult, ReconcileReport},
        pagination::{Paginated, PaginationRequest},
    },
    common::election::ElectionId,
    store::StoreHandle,
};
use crate::voting::{TallyAggregator, VoteCoordinator};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, results, reconcile]
}

#[post("/elections/<election_id>/votes", data = "<ballot>")]
async fn cast_vote(
    election_id: ElectionId,
    ballot: Json<BallotSpec>,
    store: StoreHandle,
    config: &State<Config>,
) -> Result<Json<bool>> {
    let ballot = ballot.into_inner();
    VoteCoordinator::new(&*store, config)
        .cast_vote(election_id, &ballot.carnet, ballot.candidate_id.into())
        .await?;
    Ok(Json(true))
}

#[get("/elections/<election_id>/results?<pagination..>")]
async fn results(
    election_id: ElectionId,
    pagination: PaginationRequest,
    store: StoreHandle,
) -> Result<Json<Paginated<CandidateResult>>> {
    let results = TallyAggregator::new(&*store).results(election_id).await?;
    Ok(Json(pagination.paginate(results)))
}

#[post("/elections/<election_id>/reconcile")]
async fn reconcile(election_id: ElectionId, store: StoreHandle) -> Result<Json<ReconcileReport>> {
    Ok(Json(TallyAggregator::new(&*store).reconcile(election_id).await?))
}
