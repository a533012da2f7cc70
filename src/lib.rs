#[cfg(test)]
#[macro_use]
extern crate ballot_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod contract;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod model;
pub mod workflow;

#[cfg(test)]
mod test_server;

pub use config::Config;

use config::{ConfigFairing, CorsFairing};
use logging::LoggerFairing;

/// Assemble the hashing relay from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", error::catchers())
        .attach(ConfigFairing)
        .attach(CorsFairing)
        .attach(LoggerFairing)
}
