//! Error types for the duoledger-session crate.
//!
//! Nothing here ever surfaces as an application-fatal error: the manager
//! resolves every failure path to an [`EngineState`](crate::EngineState).
//! These types exist for the validator seam and configuration loading.

use thiserror::Error;

/// Alias for `Result<T, SessionError>`.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors produced by the session engine's collaborators.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The validator request could not be completed (network, timeout).
    #[error("validator request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The validator backend answered with an unexpected status.
    #[error("validator backend returned status {status}")]
    Backend { status: u16 },

    /// The validator endpoint could not be constructed.
    #[error("invalid validator endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// A storage-layer failure escaped into the engine.
    #[error("storage error: {0}")]
    Storage(#[from] duoledger_storage::StorageError),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}
