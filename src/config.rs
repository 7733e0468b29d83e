use std::sync::Arc;

use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::contract::VotingContract;
use crate::ledger::{MemoryLedger, MongoLedger, SharedLedger};

/// Contract configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    allow_reinitialization: bool,
}

impl Config {
    pub fn new(allow_reinitialization: bool) -> Self {
        Self {
            allow_reinitialization,
        }
    }

    /// Whether `InitElection` may overwrite an existing election.
    /// Off by default.
    pub fn allow_reinitialization(&self) -> bool {
        self.allow_reinitialization
    }
}

/// A fairing that loads the contract config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.allow_reinitialization() {
            warn!("Re-initialization is enabled, InitElection may reset tallies");
        }

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which store backs the ledger.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Process-local, lost on shutdown.
    #[default]
    Memory,
    MongoDb,
}

fn default_db_name() -> String {
    "ballot_ledger".to_string()
}

/// Configuration for the ledger store.
#[derive(Debug, Deserialize)]
struct LedgerConfig {
    #[serde(default)]
    ledger_backend: LedgerBackend,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

/// A fairing that loads the ledger config, opens the ledger, and places a
/// [`VotingContract`] over it into managed state.
///
/// Must be attached after [`ConfigFairing`].
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<LedgerConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load ledger config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let ledger: SharedLedger = match config.ledger_backend {
            LedgerBackend::Memory => {
                warn!("Using an in-memory ledger, state will be lost on shutdown");
                MemoryLedger::shared()
            }
            LedgerBackend::MongoDb => {
                let Some(uri) = config.db_uri else {
                    error!("`db_uri` must be set to use the mongodb ledger backend");
                    return Err(rocket);
                };
                info!("Connecting to ledger database {}...", config.db_name);
                match MongoLedger::connect(&uri, &config.db_name).await {
                    Ok(ledger) => Arc::new(ledger),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        let contract = match rocket.state::<Config>() {
            Some(contract_config) => VotingContract::new(ledger, contract_config),
            None => {
                error!("Contract config is not loaded, attach the Config fairing first");
                return Err(rocket);
            }
        };
        info!("...ledger online!");

        rocket = rocket.manage(contract);
        Ok(rocket)
    }
}
