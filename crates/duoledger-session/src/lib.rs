//! # duoledger-session
//!
//! Session lifecycle engine for duoledger.
//!
//! Keeps an authentication session alive and consistent across the
//! replicated storage tiers of [`duoledger_storage`], revalidates it
//! against the remote identity backend, and reconciles state across
//! contexts on connectivity and visibility transitions.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  ContextSynchronizer (signals + heartbeat)    │
//! ├───────────────────────────────────────────────┤
//! │  SessionManager (state machine, recovery gate)│
//! ├──────────────────────┬────────────────────────┤
//! │  TieredSessionStore  │  AccountValidator      │
//! │  (duoledger-storage) │  (remote backend)      │
//! └──────────────────────┴────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use duoledger_session::{
//!     ContextSynchronizer, HttpAccountValidator, SessionConfig, SessionManager, SignalBus,
//! };
//!
//! let manager = Arc::new(SessionManager::new(store, validator, SessionConfig::default()));
//! let bus = SignalBus::new(manager.config().signal_buffer);
//! let sync = Arc::new(ContextSynchronizer::new(manager.clone()));
//! let _driver = sync.spawn(&bus);
//!
//! let state = manager.recover().await; // Active or Cleared
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod sync;
pub mod validator;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use manager::{EngineState, SessionManager, SessionStatus};
pub use sync::{ContextSignal, ContextSynchronizer, SignalBus};
pub use validator::{AccountValidator, HttpAccountValidator};
