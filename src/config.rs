use std::path::{Path, PathBuf};

use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    common::Identity,
    ledger::{FileJournal, Ledger},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    owner_identity: Identity,
    auth_ttl: u32,
    journal_path: Option<PathBuf>,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// The single, immutable owner of the ledger.
    pub fn owner_identity(&self) -> &Identity {
        &self.owner_identity
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Where the ledger journal lives. `None` means the ledger is volatile.
    pub fn journal_path(&self) -> Option<&Path> {
        self.journal_path.as_deref()
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the ledger fairing and control over error
/// messages.
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
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that opens and replays the ledger journal, and places the
/// resulting [`Ledger`] into managed state. Must be attached after
/// [`ConfigFairing`].
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>() else {
            error!("Ledger requires the application config to be loaded first");
            return Err(rocket);
        };
        let owner = config.owner_identity().clone();

        let ledger = match config.journal_path() {
            Some(path) => {
                info!("Opening ledger journal {}...", path.display());
                match FileJournal::open(path).await {
                    Ok((journal, history)) => {
                        Ledger::restore(owner, Box::new(journal), history).await
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                warn!("No journal_path configured, ledger will not survive a restart");
                Ledger::in_memory(owner).await
            }
        };

        match ledger {
            Ok(ledger) => {
                info!("...ledger online!");
                Ok(rocket.manage(ledger))
            }
            Err(e) => {
                error!("Failed to open ledger: {e}");
                Err(rocket)
            }
        }
    }
}
