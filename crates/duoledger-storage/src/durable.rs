//! Durable tier: one file per key.
//!
//! Survives process restarts. Keys are internal constants, so the file name
//! is derived directly from the key with a `.json` suffix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::StorageResult;
use crate::tier::{SessionTier, TierKind};

/// File-backed key-value tier rooted at a directory.
#[derive(Debug, Clone)]
pub struct DurableTier {
    dir: PathBuf,
}

impl DurableTier {
    /// Open (creating if needed) a durable tier rooted at `dir`.
    ///
    /// Blocks briefly on directory creation; call during startup, like the
    /// other tier constructors.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "durable tier opened");
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SessionTier for DurableTier {
    fn kind(&self) -> TierKind {
        TierKind::Durable
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(key = %key, "durable_tier.put");
        tokio::fs::write(self.path(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!(key = %key, "durable_tier.delete");
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
