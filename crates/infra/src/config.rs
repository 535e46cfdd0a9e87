//! Application configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional `config.*`
//! file in the working directory, then `APP_`-prefixed environment variables
//! with `__` separating nested keys (e.g. `APP_SHUTDOWN__RELEASE_TIMEOUT_SECS`).

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use storefront_observability::LogFormat;

#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
}

#[derive(Clone, Deserialize, Debug)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            local_dir: default_local_dir(),
            public_base_url: default_public_base_url(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct ShutdownConfig {
    /// Upper bound on the background-job drain. Unset waits indefinitely.
    #[serde(default)]
    pub drain_timeout_secs: Option<u64>,
    /// How long in-flight HTTP requests get once the drain is done.
    #[serde(default = "default_release_timeout_secs")]
    pub release_timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_secs.map(Duration::from_secs)
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_secs(self.release_timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: None,
            release_timeout_secs: default_release_timeout_secs(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    /// Postgres connection string. Unset selects in-memory persistence.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_http_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./public/uploads/staging")
}

fn default_local_dir() -> PathBuf {
    PathBuf::from("./public/uploads")
}

fn default_public_base_url() -> String {
    "/public/uploads".to_string()
}

fn default_release_timeout_secs() -> u64 {
    5
}

fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(environment())
        .build()?;

    config.try_deserialize()
}
