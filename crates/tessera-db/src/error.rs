//! Error types for tessera-db.

use miette::Diagnostic;
use thiserror::Error;

/// Database error type for tessera-db operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    #[diagnostic(
        code(tessera_db::connection),
        help("Check if the database file exists and is accessible")
    )]
    ConnectionError(String),

    #[error("Database query failed: {0}")]
    #[diagnostic(code(tessera_db::query))]
    QueryError(String),

    #[error("Unknown property '{property}' on {type_name}")]
    #[diagnostic(
        code(tessera_db::metadata),
        help("Criteria keys and link properties must name a declared property or column")
    )]
    UnknownProperty {
        type_name: String,
        property: String,
    },

    #[error("{type_name} declares no primary key")]
    #[diagnostic(code(tessera_db::no_primary_key))]
    NoPrimaryKey { type_name: String },

    #[error("Cannot decode column '{column}': {reason}")]
    #[diagnostic(
        code(tessera_db::decode),
        help("The declared field type must match what the table stores")
    )]
    Decode { column: String, reason: String },

    #[error("Record not found: {0}")]
    #[diagnostic(code(tessera_db::not_found))]
    NotFound(String),

    #[error("Database integrity error: {0}")]
    #[diagnostic(
        code(tessera_db::integrity),
        help("The table may be corrupted or created with a different schema")
    )]
    IntegrityError(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("Record not found".to_string()),
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DbError::IntegrityError(message.unwrap_or_else(|| code.to_string()))
            }
            rusqlite::Error::SqliteFailure(code, Some(message)) => {
                DbError::QueryError(format!("{message} ({code})"))
            }
            other => DbError::QueryError(other.to_string()),
        }
    }
}

/// Result type alias for tessera-db operations.
pub type Result<T> = std::result::Result<T, DbError>;
