//! Error types for tessera-core.

use miette::Diagnostic;
use tessera_config::ConfigError;
use tessera_db::DbError;
use thiserror::Error;

/// Errors surfaced by repositories and the assembler.
#[derive(Error, Diagnostic, Debug)]
pub enum RepoError {
    #[error("{0}")]
    #[diagnostic(code(tessera::persistence))]
    Persistence(String),

    #[error("Misuse: {0}")]
    #[diagnostic(
        code(tessera::misuse),
        help("This is a programming error; pick the operation matching the argument")
    )]
    Misuse(String),

    #[error("Domain object assembly failed: {0}")]
    #[diagnostic(code(tessera::assembly))]
    Assembly(String),

    #[error("Failed to start worker thread: {0}")]
    #[diagnostic(code(tessera::worker))]
    WorkerSpawn(#[source] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Counter store failures.
#[derive(Error, Diagnostic, Debug)]
pub enum CounterError {
    #[error("Counter store unavailable: {0}")]
    #[diagnostic(
        code(tessera::counter::unavailable),
        help("Check that the counter store is running and reachable")
    )]
    Unavailable(String),

    #[cfg(feature = "redis")]
    #[error(transparent)]
    #[diagnostic(code(tessera::counter::redis))]
    Redis(#[from] redis::RedisError),
}

/// Startup health check failures.
#[derive(Error, Diagnostic, Debug)]
pub enum BootstrapError {
    #[error("Startup health check already ran")]
    #[diagnostic(code(tessera::bootstrap::already_started))]
    AlreadyStarted,

    #[error("No CREATE TABLE mapping for {type_name}")]
    #[diagnostic(
        code(tessera::bootstrap::missing_mapper),
        help("Every entity must declare a table and at least one column")
    )]
    MissingMapper { type_name: String },
}

impl BootstrapError {
    /// Whether the process cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BootstrapError::MissingMapper { .. })
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;
