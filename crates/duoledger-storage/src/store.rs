//! Replicated session store over the three tiers.
//!
//! Writes fan out to every available tier independently (best-effort
//! replication, not all-or-nothing). Reads query tiers in fixed priority
//! order — Scoped first, Durable next, Indexed last — and repair the record
//! forward into faster tiers that missed. There is no transaction boundary
//! across tiers; `load()` repairing forward is what keeps them eventually
//! consistent.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::durable::DurableTier;
use crate::indexed::IndexedTier;
use crate::probe::CapabilityProbe;
use crate::record::{SESSION_KEY, SessionRecord};
use crate::scoped::ScopedTier;
use crate::tier::{SessionTier, TierStatus};

struct TierSlot {
    tier: Arc<dyn SessionTier>,
    status: TierStatus,
}

/// Prioritized, replicated view over a set of tiers holding one logical
/// [`SessionRecord`].
pub struct TieredSessionStore {
    /// Read priority order. Availability is fixed at construction.
    slots: Vec<TierSlot>,
}

impl TieredSessionStore {
    /// Assemble the standard three-tier store and probe availability.
    pub async fn open(scoped: ScopedTier, durable: DurableTier, indexed: IndexedTier) -> Self {
        Self::from_tiers(vec![
            Arc::new(scoped),
            Arc::new(durable),
            Arc::new(indexed),
        ])
        .await
    }

    /// Assemble a store from an explicit tier list.
    ///
    /// Read priority follows the vec order. The capability probe runs here,
    /// once; its verdict is immutable for the store's lifetime.
    pub async fn from_tiers(tiers: Vec<Arc<dyn SessionTier>>) -> Self {
        let statuses = CapabilityProbe::run(&tiers).await;
        let available = statuses.iter().filter(|s| s.available).count();
        info!(
            tiers = tiers.len(),
            available, "tiered session store opened"
        );
        let slots = tiers
            .into_iter()
            .zip(statuses)
            .map(|(tier, status)| TierSlot { tier, status })
            .collect();
        Self { slots }
    }

    /// Probe verdict for every tier, in priority order.
    pub fn tier_status(&self) -> Vec<TierStatus> {
        self.slots.iter().map(|s| s.status).collect()
    }

    /// Write the record to every available tier concurrently.
    ///
    /// Returns true iff at least one tier accepted the write. A failure on
    /// one tier does not abort the others; failures are logged and the
    /// caller's state is unaffected.
    #[instrument(skip(self, record), fields(user_id = %record.user_id))]
    pub async fn save(&self, record: &SessionRecord) -> bool {
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "session record failed to serialize");
                return false;
            }
        };

        let writes = self
            .slots
            .iter()
            .filter(|slot| slot.status.available)
            .map(|slot| {
                let payload = payload.clone();
                async move {
                    match slot.tier.put(SESSION_KEY, &payload).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(tier = %slot.status.kind, error = %e, "tier write failed");
                            false
                        }
                    }
                }
            });

        let accepted = join_all(writes).await.into_iter().filter(|ok| *ok).count();
        debug!(accepted, "session record saved");
        accepted > 0
    }

    /// Read the record, repairing faster tiers on the way out.
    ///
    /// Tiers are queried strictly in priority order, short-circuiting on the
    /// first well-formed record. Tiers that missed (empty, errored, or held
    /// a malformed payload) before the hit are re-written with the record.
    /// Malformed payloads are deleted from their tier and treated as absent.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Option<SessionRecord> {
        let mut missed: Vec<&TierSlot> = Vec::new();

        for slot in &self.slots {
            if !slot.status.available {
                continue;
            }
            let raw = match slot.tier.get(SESSION_KEY).await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    missed.push(slot);
                    continue;
                }
                Err(e) => {
                    warn!(tier = %slot.status.kind, error = %e, "tier read failed");
                    missed.push(slot);
                    continue;
                }
            };

            match SessionRecord::parse_stored(&raw) {
                Some(record) => {
                    debug!(tier = %slot.status.kind, user_id = %record.user_id, "session record loaded");
                    self.repair(&missed, &record).await;
                    return Some(record);
                }
                None => {
                    warn!(tier = %slot.status.kind, "malformed session record, discarding");
                    if let Err(e) = slot.tier.delete(SESSION_KEY).await {
                        warn!(tier = %slot.status.kind, error = %e, "malformed record cleanup failed");
                    }
                    missed.push(slot);
                }
            }
        }

        None
    }

    /// Delete the session key from every available tier.
    ///
    /// Per-tier deletion failures are logged, never raised.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        for slot in self.slots.iter().filter(|slot| slot.status.available) {
            if let Err(e) = slot.tier.delete(SESSION_KEY).await {
                warn!(tier = %slot.status.kind, error = %e, "tier delete failed");
            }
        }
        debug!("session cleared from all available tiers");
    }

    /// Re-write the record into tiers that missed before the hit.
    async fn repair(&self, missed: &[&TierSlot], record: &SessionRecord) {
        if missed.is_empty() {
            return;
        }
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "session record failed to serialize for repair");
                return;
            }
        };
        for slot in missed {
            match slot.tier.put(SESSION_KEY, &payload).await {
                Ok(()) => debug!(tier = %slot.status.kind, "tier repaired"),
                Err(e) => warn!(tier = %slot.status.kind, error = %e, "tier repair failed"),
            }
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, StorageResult};
    use crate::tier::TierKind;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Tier that fails every operation, so the probe marks it unavailable.
    struct DeadTier(TierKind);

    #[async_trait]
    impl SessionTier for DeadTier {
        fn kind(&self) -> TierKind {
            self.0
        }
        async fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable {
                tier: self.0.as_str(),
            })
        }
        async fn put(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable {
                tier: self.0.as_str(),
            })
        }
        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable {
                tier: self.0.as_str(),
            })
        }
    }

    fn record(user_id: &str) -> SessionRecord {
        SessionRecord {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            display_name: "Test".to_string(),
            profile_blob: vec![1, 2, 3],
            last_activity_at: Utc::now(),
            session_id: uuid::Uuid::now_v7().to_string(),
            tab_id: uuid::Uuid::now_v7().to_string(),
        }
    }

    async fn three_tier_store() -> (
        TieredSessionStore,
        Arc<ScopedTier>,
        Arc<IndexedTier>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let scoped = Arc::new(ScopedTier::new());
        let durable = Arc::new(DurableTier::open(dir.path()).unwrap());
        let indexed = Arc::new(IndexedTier::open_in_memory().unwrap());
        let store = TieredSessionStore::from_tiers(vec![
            scoped.clone(),
            durable.clone(),
            indexed.clone(),
        ])
        .await;
        (store, scoped, indexed, dir)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (store, _, _, _dir) = three_tier_store().await;
        let r = record("u1");

        assert!(store.save(&r).await);
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.user_id, r.user_id);
        assert_eq!(loaded.session_id, r.session_id);
        assert_eq!(loaded.tab_id, r.tab_id);
        assert!(loaded.last_activity_at >= r.last_activity_at);
    }

    #[tokio::test]
    async fn load_repairs_faster_tiers_from_slowest() {
        let (store, scoped, indexed, _dir) = three_tier_store().await;
        let r = record("u1");

        // Only the slowest tier holds the record.
        let payload = serde_json::to_string(&r).unwrap();
        indexed.put(SESSION_KEY, &payload).await.unwrap();
        assert_eq!(scoped.get(SESSION_KEY).await.unwrap(), None);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, r);

        // Faster tiers now hold it too; a second load hits the scoped tier.
        let repaired = scoped.get(SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(SessionRecord::parse_stored(&repaired).unwrap(), r);
        assert_eq!(store.load().await.unwrap(), r);
    }

    #[tokio::test]
    async fn malformed_record_is_absent_and_cleaned_up() {
        let (store, scoped, _, _dir) = three_tier_store().await;

        scoped.put(SESSION_KEY, "{{corrupt").await.unwrap();
        assert_eq!(store.load().await, None);
        // The corrupt payload was deleted, not left behind.
        assert_eq!(scoped.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_fast_tier_falls_through_to_valid_slow_tier() {
        let (store, scoped, indexed, _dir) = three_tier_store().await;
        let r = record("u1");

        scoped.put(SESSION_KEY, "garbage").await.unwrap();
        indexed
            .put(SESSION_KEY, &serde_json::to_string(&r).unwrap())
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, r);
        // Repair replaced the garbage in the scoped tier.
        let repaired = scoped.get(SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(SessionRecord::parse_stored(&repaired).unwrap(), r);
    }

    #[tokio::test]
    async fn save_succeeds_with_one_dead_tier() {
        // The worked scenario: Scoped and Durable available, Indexed dead.
        let dir = tempfile::tempdir().unwrap();
        let scoped = Arc::new(ScopedTier::new());
        let durable = Arc::new(DurableTier::open(dir.path()).unwrap());
        let store = TieredSessionStore::from_tiers(vec![
            scoped.clone(),
            durable.clone(),
            Arc::new(DeadTier(TierKind::Indexed)),
        ])
        .await;

        let statuses = store.tier_status();
        assert!(statuses[0].available && statuses[1].available);
        assert!(!statuses[2].available);

        let r = record("u1");
        assert!(store.save(&r).await);

        // Both live tiers were populated by the save.
        assert!(scoped.get(SESSION_KEY).await.unwrap().is_some());
        assert!(durable.get(SESSION_KEY).await.unwrap().is_some());
        assert_eq!(store.load().await.unwrap(), r);
    }

    #[tokio::test]
    async fn save_fails_with_no_available_tier() {
        let store = TieredSessionStore::from_tiers(vec![
            Arc::new(DeadTier(TierKind::Scoped)),
            Arc::new(DeadTier(TierKind::Durable)),
            Arc::new(DeadTier(TierKind::Indexed)),
        ])
        .await;

        assert!(!store.save(&record("u1")).await);
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn clear_removes_record_from_every_tier_subset() {
        // All non-empty subsets of the three tiers: the record must be gone
        // from each available tier after clear().
        for mask in 1_u8..8 {
            let mut tiers: Vec<Arc<dyn SessionTier>> = Vec::new();
            let mut live: Vec<Arc<ScopedTier>> = Vec::new();

            for bit in 0..3 {
                if mask & (1 << bit) != 0 {
                    // ScopedTier stands in for each position; subset shape is
                    // what matters here, not the backing.
                    let tier = Arc::new(ScopedTier::new());
                    live.push(tier.clone());
                    tiers.push(tier);
                } else {
                    tiers.push(Arc::new(DeadTier(TierKind::Durable)));
                }
            }

            let store = TieredSessionStore::from_tiers(tiers).await;
            assert!(store.save(&record("u1")).await, "mask {mask}");
            store.clear().await;

            assert_eq!(store.load().await, None, "mask {mask}");
            for tier in live {
                assert_eq!(tier.get(SESSION_KEY).await.unwrap(), None, "mask {mask}");
            }
        }
    }

    #[tokio::test]
    async fn clear_tolerates_tier_failure() {
        // A tier that passes the probe but later refuses deletes: clear()
        // must still remove the record from the healthy tiers.
        struct ProbeOnlyTier(ScopedTier);

        #[async_trait]
        impl SessionTier for ProbeOnlyTier {
            fn kind(&self) -> TierKind {
                TierKind::Durable
            }
            async fn get(&self, key: &str) -> StorageResult<Option<String>> {
                self.0.get(key).await
            }
            async fn put(&self, key: &str, value: &str) -> StorageResult<()> {
                self.0.put(key, value).await
            }
            async fn delete(&self, key: &str) -> StorageResult<()> {
                if key == crate::record::SESSION_KEY {
                    return Err(StorageError::Unavailable { tier: "durable" });
                }
                self.0.delete(key).await
            }
        }

        let scoped = Arc::new(ScopedTier::new());
        let store = TieredSessionStore::from_tiers(vec![
            scoped.clone(),
            Arc::new(ProbeOnlyTier(ScopedTier::new())),
        ])
        .await;

        assert!(store.save(&record("u1")).await);
        store.clear().await;
        assert_eq!(scoped.get(SESSION_KEY).await.unwrap(), None);
    }
}
