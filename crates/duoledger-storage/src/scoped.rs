//! Context-scoped tier: an in-process map.
//!
//! Fast, ephemeral key-value storage that lives for the owning context only
//! (the analogue of per-tab storage). First in the read priority order.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::tier::{SessionTier, TierKind};

/// In-process key-value tier. Contents die with the owning context.
#[derive(Debug, Default)]
pub struct ScopedTier {
    entries: Mutex<HashMap<String, String>>,
}

impl ScopedTier {
    /// Create an empty scoped tier.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StorageError::TaskJoin(format!("scoped tier mutex poisoned: {e}")))
    }
}

#[async_trait]
impl SessionTier for ScopedTier {
    fn kind(&self) -> TierKind {
        TierKind::Scoped
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(key = %key, "scoped_tier.put");
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!(key = %key, "scoped_tier.delete");
        self.lock()?.remove(key);
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
