#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::cors::CorsFairing;
use crate::logging::LoggerFairing;
use crate::model::store::StoreHandle;

pub mod api;
pub mod config;
pub mod cors;
pub mod error;
pub mod logging;
pub mod model;
pub mod voting;

/// Build the server: config, store, routes and fairings.
pub fn build() -> Rocket<Build> {
    mount(rocket::build())
        .attach(ConfigFairing)
        .attach(StoreFairing)
}

/// Build the server over an existing store, skipping store configuration.
pub fn rocket_for_store(store: StoreHandle) -> Rocket<Build> {
    mount(rocket::build()).attach(ConfigFairing).manage(store)
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .mount("/", cors::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(CorsFairing)
}
