use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        candidate::{CandidateDescription, CandidateSpec},
        election::{ElectionDescription, ElectionSpec},
        id::ApiId,
        pagination::{Paginated, PaginationRequest},
    },
    common::election::ElectionId,
    store::StoreHandle,
};
use crate::voting::{CandidateRegistry, ElectionRegistry};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        elections,
        election,
        create_candidate,
        candidates,
    ]
}

#[post("/elections", data = "<spec>")]
async fn create_election(
    spec: Json<ElectionSpec>,
    store: StoreHandle,
    config: &State<Config>,
) -> Result<Json<ApiId>> {
    let id = ElectionRegistry::new(&*store, config)
        .register(spec.into_inner())
        .await?;
    Ok(Json(id.into()))
}

#[get("/elections?<pagination..>")]
async fn elections(
    pagination: PaginationRequest,
    store: StoreHandle,
    config: &State<Config>,
) -> Result<Json<Paginated<ElectionDescription>>> {
    let elections = ElectionRegistry::new(&*store, config).list().await?;
    let descriptions = elections.into_iter().map(Into::into).collect();
    Ok(Json(pagination.paginate(descriptions)))
}

#[get("/elections/<election_id>")]
async fn election(
    election_id: ElectionId,
    store: StoreHandle,
    config: &State<Config>,
) -> Result<Json<ElectionDescription>> {
    let election = ElectionRegistry::new(&*store, config)
        .get(election_id)
        .await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/candidates", data = "<spec>")]
async fn create_candidate(
    election_id: ElectionId,
    spec: Json<CandidateSpec>,
    store: StoreHandle,
) -> Result<Json<ApiId>> {
    let id = CandidateRegistry::new(&*store)
        .register(election_id, spec.into_inner())
        .await?;
    Ok(Json(id.into()))
}

#[get("/elections/<election_id>/candidates?<pagination..>")]
async fn candidates(
    election_id: ElectionId,
    pagination: PaginationRequest,
    store: StoreHandle,
) -> Result<Json<Paginated<CandidateDescription>>> {
    let candidates = CandidateRegistry::new(&*store).list(election_id).await?;
    let descriptions = candidates.into_iter().map(Into::into).collect();
    Ok(Json(pagination.paginate(descriptions)))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use crate::model::{
        common::election::ElectionState,
        mongodb::Id,
        store::{MemoryStore, Store},
    };

    use super::*;

    async fn create(client: &Client, spec: &ElectionSpec) -> ElectionId {
        let response = client
            .post(uri!(create_election))
            .json(spec)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json::<ApiId>().await.unwrap().into()
    }

    #[backend_test]
    async fn create_and_get_election(client: Client) {
        let spec = ElectionSpec::example();
        let id = create(&client, &spec).await;

        let response = client.get(uri!(election(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let election = response.into_json::<ElectionDescription>().await.unwrap();
        assert_eq!(*election.id, id);
        assert_eq!(election.name, spec.name);
        assert_eq!(election.date, spec.date);
        assert_eq!(election.state, ElectionState::Active);
    }

    #[backend_test]
    async fn list_elections(client: Client, store: MemoryStore) {
        let first = create(&client, &ElectionSpec::example()).await;
        let second = create(&client, &ElectionSpec::with_state("scheduled")).await;

        let response = client
            .get(uri!(elections(PaginationRequest::default())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // Later elections have later dates and higher IDs.
        let mut expected = vec![first, second];
        expected.sort();
        let page = response
            .into_json::<Paginated<ElectionDescription>>()
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
        let listed: Vec<ElectionId> = page.items.into_iter().map(|e| e.id.into()).collect();
        assert_eq!(listed, expected);
        assert_eq!(store.election_store().elections().await.unwrap().len(), 2);
    }

    #[backend_test]
    async fn invalid_election_is_bad_request(client: Client) {
        let response = client
            .post(uri!(create_election))
            .json(&ElectionSpec::with_state("postponed"))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let body = response.into_json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["kind"], "validation");
    }

    #[backend_test]
    async fn missing_election_is_not_found(client: Client) {
        let response = client.get(uri!(election(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let body = response.into_json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["kind"], "not_found");
    }

    #[backend_test]
    async fn create_and_list_candidates(client: Client) {
        let election_id = create(&client, &ElectionSpec::example()).await;

        let mut ids = Vec::new();
        for (name, party) in [("Ana Flores", "Azul"), ("Bruno Rios", "Verde")] {
            let response = client
                .post(uri!(create_candidate(election_id)))
                .json(&CandidateSpec::example(name, party))
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
            ids.push(Id::from(response.into_json::<ApiId>().await.unwrap()));
        }
        ids.sort();

        let response = client
            .get(uri!(candidates(election_id, PaginationRequest::default())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let roster = response
            .into_json::<Paginated<CandidateDescription>>()
            .await
            .unwrap()
            .items;
        let listed: Vec<Id> = roster.iter().map(|c| c.id.into()).collect();
        assert_eq!(listed, ids);
        assert!(roster.iter().all(|c| *c.election_id == election_id));
    }

    async fn page_of_elections(
        client: &Client,
        page_num: usize,
        page_size: usize,
    ) -> Paginated<ElectionDescription> {
        let pagination = PaginationRequest {
            page_num,
            page_size,
        };
        let response = client
            .get(uri!(elections(pagination)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test]
    async fn elections_are_paginated(client: Client) {
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(create(&client, &ElectionSpec::example()).await);
        }
        ids.sort();

        let first = page_of_elections(&client, 1, 2).await;
        assert_eq!(first.pagination.total, 5);
        let first: Vec<ElectionId> = first.items.into_iter().map(|e| e.id.into()).collect();
        assert_eq!(first, ids[..2]);

        // The last page is partial.
        let last = page_of_elections(&client, 3, 2).await;
        let last: Vec<ElectionId> = last.items.into_iter().map(|e| e.id.into()).collect();
        assert_eq!(last, ids[4..]);

        let past_the_end = page_of_elections(&client, 4, 2).await;
        assert!(past_the_end.items.is_empty());
        assert_eq!(past_the_end.pagination.total, 5);
    }

    #[backend_test]
    async fn empty_election_list(client: Client) {
        let page = page_of_elections(&client, 1, 50).await;
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total, 0);
    }

    #[backend_test]
    async fn invalid_pages_are_rejected(client: Client) {
        for query in ["page_num=0", "page_size=0", "page_size=501", "page_num=first"] {
            let response = client.get(format!("/elections?{query}")).dispatch().await;
            assert!(response.status().class().is_client_error(), "{query}");

            let body = response.into_json::<serde_json::Value>().await.unwrap();
            assert_eq!(body["kind"], "validation", "{query}");
        }
    }

    #[backend_test]
    async fn candidates_are_paginated(client: Client) {
        let election_id = create(&client, &ElectionSpec::example()).await;
        for name in ["Ana Flores", "Bruno Rios", "Carla Soto"] {
            let response = client
                .post(uri!(create_candidate(election_id)))
                .json(&CandidateSpec::example(name, "Azul"))
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
        }

        let pagination = PaginationRequest {
            page_num: 2,
            page_size: 2,
        };
        let response = client
            .get(uri!(candidates(election_id, pagination)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let page = response
            .into_json::<Paginated<CandidateDescription>>()
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.items.len(), 1);
    }

    #[backend_test]
    async fn candidate_for_missing_election_is_not_found(client: Client) {
        let response = client
            .post(uri!(create_candidate(Id::new())))
            .json(&CandidateSpec::example("Ana Flores", "Azul"))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
