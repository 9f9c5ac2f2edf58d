//! Core error types used across the system

use thiserror::Error;

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity type declares a collection name the database cannot accept
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An update tried to write an identifier or creation-audit field
    #[error("Field '{0}' is immutable and cannot be updated")]
    ImmutableField(String),

    /// A sort expression could not be parsed
    #[error("Invalid sort expression: {0}")]
    InvalidSort(String),

    /// An entity could not be converted to or from BSON
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }

    pub fn invalid_sort(message: impl Into<String>) -> Self {
        CoreError::InvalidSort(message.into())
    }

    /// Checks if this error stems from a bad static declaration rather than runtime data
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, CoreError::Configuration(_) | CoreError::InvalidSort(_))
    }
}

impl From<bson::ser::Error> for CoreError {
    fn from(error: bson::ser::Error) -> Self {
        CoreError::Serialization(error.to_string())
    }
}

impl From<bson::de::Error> for CoreError {
    fn from(error: bson::de::Error) -> Self {
        CoreError::Serialization(error.to_string())
    }
}
