//! Startup capability probe.
//!
//! Detects, once per store instance, which tiers are usable in the current
//! runtime. A tier can be disabled by the host environment; the probe turns
//! that into a [`TierStatus`] instead of an error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::tier::{SessionTier, TierStatus};

/// Key written and immediately deleted by the probe.
const PROBE_KEY: &str = "__duoledger_probe";

/// One-shot availability probe over a set of tiers.
pub struct CapabilityProbe;

impl CapabilityProbe {
    /// Probe each tier with a trivial write-then-delete.
    ///
    /// Any error during probing marks that tier unavailable; the probe
    /// itself never fails. Results are cached by the caller for the
    /// engine's lifetime.
    pub async fn run(tiers: &[Arc<dyn SessionTier>]) -> Vec<TierStatus> {
        let mut statuses = Vec::with_capacity(tiers.len());
        for tier in tiers {
            let available = Self::probe_one(tier.as_ref()).await;
            if available {
                debug!(tier = %tier.kind(), "tier available");
            } else {
                warn!(tier = %tier.kind(), "tier unavailable, excluded for engine lifetime");
            }
            statuses.push(TierStatus {
                kind: tier.kind(),
                available,
            });
        }
        statuses
    }

    async fn probe_one(tier: &dyn SessionTier) -> bool {
        if let Err(e) = tier.put(PROBE_KEY, "1").await {
            debug!(tier = %tier.kind(), error = %e, "probe write failed");
            return false;
        }
        if let Err(e) = tier.delete(PROBE_KEY).await {
            debug!(tier = %tier.kind(), error = %e, "probe delete failed");
            return false;
        }
        true
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, StorageResult};
    use crate::scoped::ScopedTier;
    use crate::tier::TierKind;
    use async_trait::async_trait;

    struct BrokenTier;

    #[async_trait]
    impl SessionTier for BrokenTier {
        fn kind(&self) -> TierKind {
            TierKind::Durable
        }
        async fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable { tier: "durable" })
        }
        async fn put(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable { tier: "durable" })
        }
        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable { tier: "durable" })
        }
    }

    #[tokio::test]
    async fn healthy_tier_reports_available() {
        let tiers: Vec<Arc<dyn SessionTier>> = vec![Arc::new(ScopedTier::new())];
        let statuses = CapabilityProbe::run(&tiers).await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].kind, TierKind::Scoped);
        assert!(statuses[0].available);
    }

    #[tokio::test]
    async fn broken_tier_reports_unavailable() {
        let tiers: Vec<Arc<dyn SessionTier>> =
            vec![Arc::new(ScopedTier::new()), Arc::new(BrokenTier)];
        let statuses = CapabilityProbe::run(&tiers).await;
        assert!(statuses[0].available);
        assert!(!statuses[1].available);
        assert_eq!(statuses[1].kind, TierKind::Durable);
    }

    #[tokio::test]
    async fn probe_leaves_no_residue() {
        let scoped = Arc::new(ScopedTier::new());
        let tiers: Vec<Arc<dyn SessionTier>> = vec![scoped.clone()];
        CapabilityProbe::run(&tiers).await;
        assert_eq!(scoped.get(PROBE_KEY).await.unwrap(), None);
    }
}
