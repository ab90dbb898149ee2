use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use tessera_db::Dialect;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

pub const CONFIG_ENV: &str = "TESSERA_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "tessera.toml";
pub const DEFAULT_ID_MAP_KEY: &str = "ID_MAP_KEY";

/// Repository layer configuration.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Dialect of the target database. Only `mysql` creates entity tables
    /// at startup.
    /// Default: sqlite
    pub dialect: Dialect,

    /// Root key of the id counters in the counter store.
    /// Default: ID_MAP_KEY
    pub id_map_key: String,

    pub database: DatabaseConfig,

    pub counter: CounterConfig,

    pub worker: WorkerConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file. In-memory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterConfig {
    pub backend: CounterBackend,

    /// Connection url for the redis backend.
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Bounded queue size; the oldest task is dropped when full.
    /// Default: 1024
    pub queue_capacity: usize,

    /// Default: tessera-worker
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            thread_name: "tessera-worker".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            id_map_key: DEFAULT_ID_MAP_KEY.to_string(),
            database: DatabaseConfig::default(),
            counter: CounterConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

/// Location of the config file: `$TESSERA_CONFIG`, else `./tessera.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Loads the configuration and makes it the process-wide one.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
    Ok(())
}

/// The process-wide configuration, or defaults if [`init`] was never called.
pub fn get_config() -> Config {
    CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}

impl Config {
    /// Loads the configuration from [`config_path`].
    /// If the file is not found, the default configuration is used.
    pub fn new() -> Result<Self> {
        Self::from_path(config_path())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config: Config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Self::default()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.counter.backend == CounterBackend::Redis && self.counter.url.is_none() {
            return Err(ConfigError::MissingRedisUrl);
        }
        if self.id_map_key.is_empty() {
            return Err(ConfigError::EmptyIdMapKey);
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialized)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}
