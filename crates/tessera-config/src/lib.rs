pub mod config;
pub mod error;

pub use config::{Config, CounterBackend, CounterConfig, DatabaseConfig, WorkerConfig};
pub use error::ConfigError;

#[cfg(test)]
pub mod test_utils;
