//! Core error types for phonejail-core.
//!
//! This module defines the error hierarchy using thiserror. Collaborator
//! failures (enforcement backend, completion service) have their own closed
//! enums and are lifted into [`CoreError`] at the call site that owns the
//! schema or session they concern.

use std::path::PathBuf;
use thiserror::Error;

use crate::completion::CompletionError;
use crate::schema::SchemaId;

/// Core error type for phonejail-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The enforcement backend refused or failed to apply a change.
    /// The schema's status is left untouched.
    #[error("Enforcement failed for schema {schema_id}: {message}")]
    EnforcementFailure { schema_id: SchemaId, message: String },

    /// The enforcement backend is not authorized to shield content.
    #[error("Not authorized to enforce schema {schema_id}")]
    NotAuthorizedForEnforcement { schema_id: SchemaId },

    /// The completion service failed while negotiating access.
    #[error("Negotiation transport error: {0}")]
    NegotiationTransport(#[from] CompletionError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Schema {0} not found")]
    SchemaNotFound(SchemaId),

    #[error("Schema {0} is already active")]
    AlreadyActive(SchemaId),

    /// Mutation attempted while strict mode holds the gate locked.
    #[error("Access is locked by strict mode; negotiate with the jailkeeper first")]
    AccessLocked,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Async runtime unavailable for an operation that needs one.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CoreError {
    /// Errors the user cannot fix by retrying or rephrasing; they point at
    /// setup (credentials, config file) instead.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CoreError::Config(_) | CoreError::NegotiationTransport(CompletionError::Unauthorized)
        )
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored record could not be decoded.
    #[error("Corrupt record '{key}': {message}")]
    CorruptRecord { key: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
///
/// Raised by the schema creation flow and by user input checks. Always
/// recoverable by re-entering the offending value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a schema name")]
    EmptyName,

    #[error("Select at least one app, website or category to block")]
    NoContentSelected,

    #[error("Add at least one blocking condition")]
    NoConditions,

    #[error("A schedule must be active on at least one day")]
    EmptyActiveDays,

    #[error("A daily usage limit must be greater than zero")]
    ZeroUsageLimit,

    #[error("Statement is empty")]
    EmptyStatement,

    #[error("Duration must be greater than zero")]
    ZeroDuration,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
