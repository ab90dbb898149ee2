use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(tessera_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(tessera_config::toml_deserialize),
        help("Check your tessera.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Worker queue capacity must be greater than zero")]
    #[diagnostic(
        code(tessera_config::queue_capacity),
        help("Set [worker] queue_capacity to a positive number")
    )]
    ZeroQueueCapacity,

    #[error("Redis counter backend requires a url")]
    #[diagnostic(
        code(tessera_config::missing_redis_url),
        help("Add `url = \"redis://host:port\"` under [counter]")
    )]
    MissingRedisUrl,

    #[error("Id map key cannot be empty")]
    #[diagnostic(code(tessera_config::empty_id_map_key))]
    EmptyIdMapKey,

    #[error("IO error: {0}")]
    #[diagnostic(code(tessera_config::io))]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
