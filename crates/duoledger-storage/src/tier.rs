//! Storage tier abstraction.
//!
//! A tier is anything exposing `get`/`put`/`delete` that may suspend. The
//! three concrete tiers differ in survival semantics, not interface:
//!
//! | Tier    | Backing                  | Survives           |
//! |---------|--------------------------|--------------------|
//! | Scoped  | in-process `HashMap`     | owning context     |
//! | Durable | file per key             | restarts           |
//! | Indexed | SQLite kv table          | restarts (async)   |
//!
//! [`TieredSessionStore`](crate::TieredSessionStore) treats all three
//! polymorphically through this trait.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageResult;

/// Which of the three tiers an implementation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    /// Fast, context-scoped storage. Highest read priority.
    Scoped,
    /// Restart-surviving key-value files.
    Durable,
    /// Restart-surviving indexed store; access always suspends. Lowest read
    /// priority, used as a recovery source of last resort.
    Indexed,
}

impl TierKind {
    /// Short machine-readable name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scoped => "scoped",
            Self::Durable => "durable",
            Self::Indexed => "indexed",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of one tier, decided once at store construction.
///
/// A later failure of an available tier is a per-operation error, not a
/// re-probe; the flag never changes for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierStatus {
    pub kind: TierKind,
    pub available: bool,
}

/// A single key-value storage backend with its own availability and
/// survival semantics.
///
/// Implementations must be cheap to call concurrently; each individual
/// write is atomic with respect to that tier's own subsequent reads.
#[async_trait]
pub trait SessionTier: Send + Sync {
    /// Which tier this is.
    fn kind(&self) -> TierKind;

    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Insert or replace the value under `key`.
    async fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
