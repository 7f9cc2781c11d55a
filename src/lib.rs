#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, LedgerFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// Build the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Mount the routes and attach the fairings. The config fairing must come
/// before the ledger fairing, which reads the config.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(LedgerFairing)
        .attach(LoggerFairing)
}

/// A server with a fresh, volatile ledger owned by the example owner.
#[cfg(test)]
pub(crate) fn test_rocket() -> Rocket<Build> {
    use crate::model::common::Identity;

    let figment = rocket::Config::figment()
        .merge(("owner_identity", Identity::owner_example()))
        .merge(("jwt_secret", "test secret"))
        .merge(("auth_ttl", 3600));
    assemble(rocket::custom(figment))
}
