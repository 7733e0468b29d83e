#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{Config, ConfigFairing, LedgerFairing};
use crate::contract::VotingContract;
use crate::ledger::SharedLedger;
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;

/// Build the gateway, opening the ledger named in the figment config.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(LedgerFairing)
}

/// Build the gateway over an already-open ledger.
pub fn rocket_for_ledger(ledger: SharedLedger, config: Config) -> Rocket<Build> {
    let contract: VotingContract = VotingContract::new(ledger, &config);
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(config)
        .manage(contract)
}
