//! Cross-context synchronization.
//!
//! Connectivity and visibility signals arrive over a broadcast
//! [`SignalBus`] and are mapped onto the manager's recovery and heartbeat
//! entry points. Overlapping recovery triggers collapse inside the manager
//! (single-permit gate); this module additionally coalesces signal-driven
//! persists that land inside the write-sync window.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::manager::SessionManager;

/// An external runtime signal the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSignal {
    /// Connectivity restored. Time may have passed offline, so the session
    /// is revalidated in full.
    Online,
    /// Connectivity lost. Purely advisory; no store mutation.
    Offline,
    /// This context became visible. Another context may have logged out or
    /// refreshed the session in the meantime.
    Visible,
    /// Process teardown is imminent; one best-effort save remains.
    Teardown,
}

/// Publish/subscribe bus for [`ContextSignal`]s, backed by
/// [`tokio::sync::broadcast`].
///
/// Cheaply cloneable and `Send + Sync`. Publishing with no live subscriber
/// is not an error; the signal is simply dropped.
#[derive(Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<ContextSignal>,
}

impl SignalBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a signal to all current subscribers.
    pub fn publish(&self, signal: ContextSignal) {
        match self.sender.send(signal) {
            Ok(subscribers) => debug!(?signal, subscribers, "signal published"),
            Err(_) => debug!(?signal, "signal dropped, no subscribers"),
        }
    }

    /// Open a new subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<ContextSignal> {
        self.sender.subscribe()
    }
}

/// Drives the manager from context signals and the heartbeat ticker.
pub struct ContextSynchronizer {
    manager: Arc<SessionManager>,
    online: AtomicBool,
    last_persist: Mutex<Option<Instant>>,
    heartbeat_interval: Duration,
    write_sync_interval: Duration,
}

impl ContextSynchronizer {
    /// Create a synchronizer over the manager, taking intervals from its
    /// configuration. Contexts start online.
    pub fn new(manager: Arc<SessionManager>) -> Self {
        let heartbeat_interval = manager.config().heartbeat_interval();
        let write_sync_interval = manager.config().write_sync_interval();
        Self {
            manager,
            online: AtomicBool::new(true),
            last_persist: Mutex::new(None),
            heartbeat_interval,
            write_sync_interval,
        }
    }

    /// Whether the last connectivity signal reported us online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Map one signal onto a lifecycle action.
    #[instrument(skip(self))]
    pub async fn handle_signal(&self, signal: ContextSignal) {
        match signal {
            ContextSignal::Online => {
                self.online.store(true, Ordering::SeqCst);
                info!("connectivity restored, revalidating session");
                self.manager.recover().await;
                self.mark_persisted();
            }
            ContextSignal::Offline => {
                self.online.store(false, Ordering::SeqCst);
                info!("connectivity lost");
            }
            ContextSignal::Visible => {
                debug!("context visible, revalidating session");
                self.manager.recover().await;
                self.mark_persisted();
            }
            ContextSignal::Teardown => {
                debug!("teardown imminent, final heartbeat");
                self.manager.heartbeat().await;
            }
        }
    }

    /// Subscribe to the bus and run until it closes.
    pub async fn run(&self, mut signals: broadcast::Receiver<ContextSignal>) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Ok(signal) => self.handle_signal(signal).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "signal bus lagged, signals dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => self.heartbeat_tick().await,
            }
        }
        debug!("context synchronizer stopped");
    }

    /// Spawn the run loop on the current runtime.
    pub fn spawn(self: &Arc<Self>, bus: &SignalBus) -> JoinHandle<()> {
        let synchronizer = Arc::clone(self);
        let signals = bus.subscribe();
        tokio::spawn(async move { synchronizer.run(signals).await })
    }

    /// Periodic heartbeat, coalesced against recent signal-driven persists.
    async fn heartbeat_tick(&self) {
        if !self.should_persist() {
            debug!("heartbeat coalesced inside write-sync window");
            return;
        }
        self.manager.heartbeat().await;
        self.mark_persisted();
    }

    fn should_persist(&self) -> bool {
        let last = self
            .last_persist
            .lock()
            .expect("synchronizer persist lock poisoned");
        match *last {
            Some(at) => at.elapsed() >= self.write_sync_interval,
            None => true,
        }
    }

    fn mark_persisted(&self) {
        let mut last = self
            .last_persist
            .lock()
            .expect("synchronizer persist lock poisoned");
        *last = Some(Instant::now());
    }
}

// ── tests ────────────────────────────────────────────────────────────
