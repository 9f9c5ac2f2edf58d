//! Repository error types
//!
//! Driver failures are carried unchanged inside [`RepositoryError::Driver`];
//! the repository never retries or re-classifies them. The classification
//! helpers below only inspect the wrapped error.
//!
//! "No matching document" is never an error: lookups return `Ok(None)`,
//! counts return `0` and filters return an empty vector.

use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

use core_kernel::CoreError;

/// Server code for a unique index violation
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Invalid or unreadable client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid entity declaration, sort expression or update
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error reported by the MongoDB driver, passed through as is
    #[error("MongoDB error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// A document could not be converted to or from BSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The ambient cancellation token fired before the operation finished
    #[error("Operation cancelled")]
    Cancelled,

    /// The context reports an active transaction but exposes no session
    #[error("Active transaction has no session attached")]
    SessionUnavailable,

    /// A transaction was begun while another one is active
    #[error("A transaction is already active on this context")]
    TransactionAlreadyActive,

    /// Commit or abort was requested without an active transaction
    #[error("No active transaction on this context")]
    NoActiveTransaction,
}

impl RepositoryError {
    /// Creates a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        RepositoryError::Config(message.into())
    }

    /// Returns the underlying driver error, if this is one
    pub fn as_driver(&self) -> Option<&mongodb::error::Error> {
        match self {
            RepositoryError::Driver(error) => Some(error),
            _ => None,
        }
    }

    /// Checks if this error is a unique index violation
    pub fn is_duplicate_key(&self) -> bool {
        let Some(error) = self.as_driver() else {
            return false;
        };

        match error.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
                write_error.code == DUPLICATE_KEY_CODE
            }
            ErrorKind::InsertMany(insert_error) => insert_error
                .write_errors
                .as_ref()
                .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY_CODE)),
            _ => false,
        }
    }

    /// Checks if this error is a connectivity issue
    pub fn is_connection_error(&self) -> bool {
        let Some(error) = self.as_driver() else {
            return false;
        };

        matches!(
            error.kind.as_ref(),
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
        )
    }

    /// Checks if this error stems from configuration rather than runtime state
    pub fn is_configuration_error(&self) -> bool {
        match self {
            RepositoryError::Config(_) => true,
            RepositoryError::Core(error) => error.is_configuration_error(),
            _ => false,
        }
    }
}

impl From<config::ConfigError> for RepositoryError {
    fn from(error: config::ConfigError) -> Self {
        RepositoryError::Config(error.to_string())
    }
}

impl From<bson::ser::Error> for RepositoryError {
    fn from(error: bson::ser::Error) -> Self {
        RepositoryError::Serialization(error.to_string())
    }
}

impl From<bson::de::Error> for RepositoryError {
    fn from(error: bson::de::Error) -> Self {
        RepositoryError::Serialization(error.to_string())
    }
}
