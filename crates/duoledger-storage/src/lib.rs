//! # duoledger-storage
//!
//! Session persistence tiers for duoledger.
//!
//! A single logical [`SessionRecord`] is replicated across up to three
//! independent key-value tiers with different survival semantics, probed
//! once for availability and read with forward repair.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  TieredSessionStore                          │
//! │  save: fan-out to all available tiers        │
//! │  load: Scoped → Durable → Indexed + repair   │
//! ├──────────────────────────────────────────────┤
//! │  ScopedTier    (HashMap, context lifetime)   │
//! │  DurableTier   (file per key, restarts)      │
//! │  IndexedTier   (SQLite kv, always suspends)  │
//! ├──────────────────────────────────────────────┤
//! │  CapabilityProbe (once per store lifetime)   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use duoledger_storage::{DurableTier, IndexedTier, ScopedTier, TieredSessionStore};
//!
//! let store = TieredSessionStore::open(
//!     ScopedTier::new(),
//!     DurableTier::open("data/session")?,
//!     IndexedTier::open("data/session.db")?,
//! ).await;
//! ```

pub mod durable;
pub mod error;
pub mod indexed;
pub mod probe;
pub mod record;
pub mod scoped;
pub mod store;
pub mod tier;

// ── re-exports ───────────────────────────────────────────────────────

pub use durable::DurableTier;
pub use error::{StorageError, StorageResult};
pub use indexed::IndexedTier;
pub use probe::CapabilityProbe;
pub use record::{SESSION_KEY, SessionRecord};
pub use scoped::ScopedTier;
pub use store::TieredSessionStore;
pub use tier::{SessionTier, TierKind, TierStatus};
