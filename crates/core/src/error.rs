//! Error types for the DeskClaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is the top-level
//! wrapper used at crate seams.

use thiserror::Error;

/// The top-level error type for all DeskClaw operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Model-provider failures, classified the way the turn loop needs them:
/// every variant is terminal for the current user utterance.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider's response could not be parsed into the expected shape.
    #[error("Response validation failed: {0}")]
    Validation(String),

    /// The provider rejected the request with a non-success status.
    #[error("API request failed: {message} (status: {status_code})")]
    Status { status_code: u16, message: String },

    /// The request never completed (DNS, TLS, connection reset, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Anything that doesn't fit the above.
    #[error("Provider error: {0}")]
    Unclassified(String),
}

/// Fatal configuration problems — the loop never starts on these.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Unknown tool version: {0}")]
    UnknownToolVersion(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_status() {
        let err = Error::Provider(ProviderError::Status {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn config_error_displays_version() {
        let err = Error::Config(ConfigError::UnknownToolVersion("computer_use_1999".into()));
        assert!(err.to_string().contains("computer_use_1999"));
    }
}
