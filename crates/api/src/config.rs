//! Application configuration.
//!
//! Sources, later ones winning:
//! 1. Defaults in code
//! 2. `config/{environment}.toml` (optional)
//! 3. Environment variables with the `STOCKLEDGER__` prefix, `__` between keys
//!    (`STOCKLEDGER__SERVER__PORT=9090`)

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use stockledger_infra::PoolSettings;
use stockledger_observability::LogConfig;

const ENV_PREFIX: &str = "STOCKLEDGER";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Current environment (development, production)
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Without one the ledger runs in memory.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("STOCKLEDGER_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self::build(&environment, Environment::with_prefix(ENV_PREFIX))
    }

    fn build(environment: &str, env: Environment) -> Result<Self, ConfigError> {
        let defaults = PoolSettings::default();

        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", defaults.max_connections)?
            .set_default("database.min_connections", defaults.min_connections)?
            .set_default("database.acquire_timeout_secs", defaults.acquire_timeout.as_secs())?
            .set_default("log.filter", "info")?
            .set_default("log.json", true)?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(env.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
