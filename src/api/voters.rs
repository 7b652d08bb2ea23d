use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::voter::{VoterDescription, VoterSpec, VoterStats},
    store::StoreHandle,
};
use crate::voting::VoterRegistry;

pub fn routes() -> Vec<Route> {
    routes![create_voter, voter_stats, voter]
}

#[post("/voters", data = "<spec>")]
async fn create_voter(spec: Json<VoterSpec>, store: StoreHandle) -> Result<Json<bool>> {
    VoterRegistry::new(&*store).register(spec.into_inner()).await?;
    Ok(Json(true))
}

#[get("/voters/stats")]
async fn voter_stats(store: StoreHandle) -> Result<Json<VoterStats>> {
    Ok(Json(VoterRegistry::new(&*store).stats().await?))
}

#[get("/voters/<carnet>")]
async fn voter(carnet: &str, store: StoreHandle) -> Result<Json<VoterDescription>> {
    let voter = VoterRegistry::new(&*store).get(carnet).await?;
    Ok(Json(voter.into()))
}
