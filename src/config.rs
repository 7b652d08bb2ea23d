use std::time::Duration;

use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    common::policy::{DatePolicy, VoterScope},
    mongodb::MongoStore,
    store::{MemoryStore, StoreHandle},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    date_policy: DatePolicy,
    #[serde(default)]
    voter_scope: VoterScope,
    #[serde(default = "default_tally_attempts")]
    tally_attempts: u32,
    #[serde(default = "default_tally_backoff_ms")]
    tally_backoff_ms: u64,
    #[serde(default = "default_cors_origin")]
    cors_origin: String,
}

/// Upper bound on the configured tally backoff.
const MAX_TALLY_BACKOFF_MS: u64 = 60_000;

fn default_tally_attempts() -> u32 {
    3
}

fn default_tally_backoff_ms() -> u64 {
    50
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            date_policy: DatePolicy::default(),
            voter_scope: VoterScope::default(),
            tally_attempts: default_tally_attempts(),
            tally_backoff_ms: default_tally_backoff_ms(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl Config {
    /// Which election dates registration accepts.
    pub fn date_policy(&self) -> DatePolicy {
        self.date_policy
    }

    /// Whether a voter votes once ever, or once per election.
    pub fn voter_scope(&self) -> VoterScope {
        self.voter_scope
    }

    /// How many times a tally increment is attempted before the vote is
    /// reported as a partial failure. Always at least one.
    pub fn tally_attempts(&self) -> u32 {
        self.tally_attempts.max(1)
    }

    /// Base delay between tally attempts; attempt `n` waits `n` times this.
    /// Capped at one minute.
    pub fn tally_backoff(&self) -> Duration {
        Duration::from_millis(self.tally_backoff_ms.min(MAX_TALLY_BACKOFF_MS))
    }

    /// Value of the `Access-Control-Allow-Origin` header.
    pub fn cors_origin(&self) -> &str {
        &self.cors_origin
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
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
        info!(
            "Voter scope is {:?}, date policy is {:?}",
            config.voter_scope, config.date_policy
        );

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which backend to store data in.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Backend {
    /// Process-local tables; everything is lost on shutdown.
    #[default]
    Memory,
    MongoDb,
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    #[serde(default)]
    store: Backend,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "elections".to_string()
}

/// A fairing that loads the store config, connects to the configured backend,
/// performs any setup necessary, and places a [`StoreHandle`] into managed
/// state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store = match config.store {
            Backend::Memory => {
                warn!("Using the in-memory store; nothing will survive a restart");
                StoreHandle::from(MemoryStore::new())
            }
            Backend::MongoDb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when `store` is `mongodb`");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                // Connect and ensure the required indexes exist.
                match MongoStore::connect(&db_uri, &config.db_name).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        StoreHandle::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use rocket::figment::{providers::Serialized, Figment};

    #[test]
    fn missing_keys_take_defaults() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.date_policy(), DatePolicy::FutureOnly);
        assert_eq!(config.voter_scope(), VoterScope::Global);
        assert_eq!(config.tally_attempts(), 3);
        assert_eq!(config.cors_origin(), "*");
    }

    #[test]
    fn reads_policies_in_snake_case() {
        let figment = Figment::new()
            .merge(Serialized::default("voter_scope", "per_election"))
            .merge(Serialized::default("date_policy", "unrestricted"))
            .merge(Serialized::default("tally_attempts", 0));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.voter_scope(), VoterScope::PerElection);
        assert_eq!(config.date_policy(), DatePolicy::Unrestricted);
        // Zero attempts would never record a tally.
        assert_eq!(config.tally_attempts(), 1);
    }

    #[test]
    fn tally_backoff_is_capped() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.tally_backoff(), Duration::from_millis(50));

        let figment = Figment::new().merge(Serialized::default("tally_backoff_ms", u64::MAX));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.tally_backoff(), Duration::from_secs(60));
        // The longest wait between attempts still fits in a `Duration`.
        assert!(config.tally_backoff().checked_mul(u32::MAX).is_some());
    }

    #[test]
    fn store_defaults_to_memory() {
        let config: StoreConfig = Figment::new().extract().unwrap();
        assert_eq!(config.store, Backend::Memory);
        assert_eq!(config.db_name, "elections");

        let figment = Figment::new().merge(Serialized::default("store", "mongodb"));
        let config: StoreConfig = figment.extract().unwrap();
        assert_eq!(config.store, Backend::MongoDb);
    }
}
