//! Session lifecycle manager.
//!
//! Owns the engine state machine and is the only component with a public
//! API for the rest of the application. All guard state lives on the
//! instance (no module-level globals), so tests can run isolated managers
//! side by side.
//!
//! ```text
//! Uninitialized ──login──────────────▶ Active ──heartbeat──▶ Active
//!       │                               │
//!       └──recover──▶ Recovering ───────┤
//!                        │              │ (stale / gone / validator err)
//!                        ▼              ▼
//!                     Cleared ◀── Expired / Invalid
//! ```
//!
//! `Expired` and `Invalid` are transient: they are logged during a recovery
//! pass and resolve immediately to `Cleared`. `Cleared` and `Uninitialized`
//! both report "no active session".

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use duoledger_storage::{SessionRecord, TierStatus, TieredSessionStore};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::validator::AccountValidator;

/// The engine's current state. Process-local, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    /// No session has been established in this context.
    Uninitialized,
    /// A persisted record is being loaded and revalidated.
    Recovering,
    /// A validated session is live.
    Active,
    /// A persisted record was found stale during a recovery pass.
    Expired,
    /// The remote backend rejected (or could not confirm) the account.
    Invalid,
    /// The session was purged from every tier.
    Cleared,
}

impl EngineState {
    /// Whether this state represents a live, usable session.
    pub fn has_session(self) -> bool {
        matches!(self, Self::Active)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Recovering => "recovering",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
            Self::Cleared => "cleared",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the engine for the consuming application.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Whether a validated session is currently live.
    pub session_valid: bool,
    /// The current engine state.
    pub state: EngineState,
    /// When a record last reached at least one tier, if ever.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Probe verdict per tier, in read priority order.
    pub tiers: Vec<TierStatus>,
}

struct Inner {
    state: EngineState,
    record: Option<SessionRecord>,
    last_sync_at: Option<DateTime<Utc>>,
}

/// Orchestrates initialization, heartbeat, expiry detection, and recovery.
pub struct SessionManager {
    store: TieredSessionStore,
    validator: Arc<dyn AccountValidator>,
    config: SessionConfig,
    /// Generated once per manager instance; distinguishes concurrent
    /// contexts sharing the durable tiers.
    tab_id: String,
    /// Brief critical sections only; never held across an await.
    inner: Mutex<Inner>,
    /// Single-permit gate: overlapping recovery triggers collapse into one
    /// in-flight pass, extra triggers are dropped rather than queued.
    recovery_gate: Semaphore,
}

impl SessionManager {
    /// Create a manager over a probed store and a remote validator.
    pub fn new(
        store: TieredSessionStore,
        validator: Arc<dyn AccountValidator>,
        config: SessionConfig,
    ) -> Self {
        let tab_id = Uuid::now_v7().to_string();
        debug!(tab_id = %tab_id, "session manager created");
        Self {
            store,
            validator,
            config,
            tab_id,
            inner: Mutex::new(Inner {
                state: EngineState::Uninitialized,
                record: None,
                last_sync_at: None,
            }),
            recovery_gate: Semaphore::new(1),
        }
    }

    /// The engine configuration this manager runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// This context's tab identifier.
    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    /// Establish a fresh session, bypassing recovery.
    ///
    /// A brand-new session id is generated and the record is written to
    /// every available tier. Durability is best-effort: the session goes
    /// Active even if no tier accepted the write (the failure is logged).
    #[instrument(skip(self, profile_blob), fields(user_id = %user_id))]
    pub async fn login(
        &self,
        user_id: &str,
        email: &str,
        display_name: &str,
        profile_blob: Vec<u8>,
    ) -> SessionStatus {
        let record = SessionRecord {
            user_id: user_id.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            profile_blob,
            last_activity_at: Utc::now(),
            session_id: Uuid::now_v7().to_string(),
            tab_id: self.tab_id.clone(),
        };

        let saved = self.store.save(&record).await;
        if !saved {
            warn!("no tier accepted the login record, session is memory-only");
        }

        {
            let mut inner = self.lock();
            inner.state = EngineState::Active;
            inner.record = Some(record);
            if saved {
                inner.last_sync_at = Some(Utc::now());
            }
        }

        info!("session established");
        self.status()
    }

    /// Run one recovery pass: load the persisted record, check expiry, and
    /// revalidate against the remote backend.
    ///
    /// Returns the state the engine settled in. If another pass is already
    /// in flight, this trigger is dropped and the current state returned —
    /// no second validator call is made.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> EngineState {
        let _permit = match self.recovery_gate.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                debug!("recovery already in flight, trigger dropped");
                return self.state();
            }
        };

        let previous = {
            let mut inner = self.lock();
            let previous = inner.state;
            inner.state = EngineState::Recovering;
            previous
        };
        debug!(from = %previous, "recovery pass started");

        let Some(mut record) = self.store.load().await else {
            return self.purge(EngineState::Cleared, "no persisted session").await;
        };

        if record.idle_secs() > self.config.session_timeout_secs as i64 {
            info!(
                user_id = %record.user_id,
                idle_secs = record.idle_secs(),
                "persisted session expired"
            );
            return self.purge(EngineState::Expired, "session timed out").await;
        }

        // Fail closed: an unreachable validator purges the session rather
        // than trusting a record we cannot confirm.
        let account_exists = match self.validator.exists(&record.user_id).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "validator unreachable, failing closed");
                false
            }
        };
        if !account_exists {
            info!(user_id = %record.user_id, "account no longer valid");
            return self.purge(EngineState::Invalid, "remote validation failed").await;
        }

        // One heartbeat before declaring Active: bump the activity
        // timestamp, stamp this context's tab id, and re-save.
        record.touch();
        record.tab_id = self.tab_id.clone();
        let saved = self.store.save(&record).await;

        {
            let mut inner = self.lock();
            inner.state = EngineState::Active;
            inner.record = Some(record);
            if saved {
                inner.last_sync_at = Some(Utc::now());
            }
        }

        info!("session recovered");
        EngineState::Active
    }

    /// Refresh the activity timestamp and re-save, if a session is active.
    ///
    /// Write failures are logged, never fatal: the in-memory session stays
    /// Active regardless of the persistence outcome.
    #[instrument(skip(self))]
    pub async fn heartbeat(&self) {
        let record = {
            let mut inner = self.lock();
            if inner.state != EngineState::Active {
                debug!(state = %inner.state, "heartbeat skipped, no active session");
                return;
            }
            match inner.record.as_mut() {
                Some(record) => {
                    record.touch();
                    record.clone()
                }
                None => return,
            }
        };

        if self.store.save(&record).await {
            self.lock().last_sync_at = Some(Utc::now());
            debug!("heartbeat persisted");
        } else {
            warn!("heartbeat write failed on every tier");
        }
    }

    /// Tear the session down: purge every tier and reset to Uninitialized.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.store.clear().await;
        let mut inner = self.lock();
        inner.state = EngineState::Uninitialized;
        inner.record = None;
        info!("session logged out");
    }

    /// The current engine state.
    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    /// Snapshot for the consuming application.
    pub fn status(&self) -> SessionStatus {
        let inner = self.lock();
        SessionStatus {
            session_valid: inner.state.has_session(),
            state: inner.state,
            last_sync_at: inner.last_sync_at,
            tiers: self.store.tier_status(),
        }
    }

    /// Purge all tiers and settle in `Cleared`, logging the transient state
    /// that led there (`Expired`, `Invalid`, or `Cleared` itself).
    async fn purge(&self, via: EngineState, reason: &'static str) -> EngineState {
        self.store.clear().await;
        let mut inner = self.lock();
        inner.state = EngineState::Cleared;
        inner.record = None;
        info!(via = %via, reason, "session cleared");
        EngineState::Cleared
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-section; propagating the panic
        // is the only sensible option in this single-owner design.
        self.inner.lock().expect("session manager state lock poisoned")
    }
}

// ── tests ────────────────────────────────────────────────────────────
