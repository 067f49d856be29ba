//! Error types for the duoledger-storage crate.
//!
//! All tier operations return [`StorageError`] via [`StorageResult`].
//! Uses `thiserror` for ergonomic, zero-cost error definitions.

use thiserror::Error;

/// Alias for `Result<T, StorageError>`.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur inside a storage tier.
///
/// Tier errors never escape [`crate::TieredSessionStore`] — the store logs
/// them and degrades to the remaining tiers. The variants exist so the
/// per-tier logs carry the real cause.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite operation failed (indexed tier).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem operation failed (durable tier).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The tier was disabled by the host environment.
    #[error("tier {tier} is unavailable")]
    Unavailable { tier: &'static str },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
