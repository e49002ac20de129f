use thiserror::Error;

/// Canonical error type for slocheck operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration is structurally valid but semantically unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable explanation of the rejected value.
        message: String,
    },

    /// An SLI threshold predicate could not be parsed.
    #[error("invalid threshold `{input}`: {message}")]
    InvalidThreshold {
        /// The predicate string as supplied.
        input: String,
        /// Why it was rejected.
        message: String,
    },

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },

    /// I/O error occurred while writing a report or reading a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl CoreError {
    /// Creates an `InvalidConfig` variant.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an `InvalidThreshold` variant.
    #[must_use]
    pub fn invalid_threshold(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidThreshold {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Convenient result alias for slocheck operations.
pub type CoreResult<T> = Result<T, CoreError>;
