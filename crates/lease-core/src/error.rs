//! Error types for the lease library.

use std::path::PathBuf;

use thiserror::Error;

use crate::provision::ProvisionError;

/// Comprehensive error type for all scheduler operations.
#[derive(Error, Debug)]
pub enum LeaseError {
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: u64 },
    /// Job not found for the given ID
    #[error("Job with ID {id} not found")]
    JobNotFound { id: u64 },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// A batch file could not be parsed into allocation windows
    #[error("Malformed batch '{path}': {reason}")]
    MalformedBatch { path: PathBuf, reason: String },
    /// Remote provisioning errors
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// The operation was interrupted by shutdown
    #[error("Operation cancelled")]
    Cancelled,
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> LeaseError {
        LeaseError::Database {
            message: self.message,
            source,
        }
    }
}

impl LeaseError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates an input validation error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a file system error for `path`.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Wraps a `spawn_blocking` join failure.
    pub(crate) fn join(error: &tokio::task::JoinError) -> Self {
        Self::configuration(format!("Task join error: {error}"))
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| LeaseError::database(message).with_source(e))
    }
}

/// Result type alias for lease operations
pub type Result<T> = std::result::Result<T, LeaseError>;
