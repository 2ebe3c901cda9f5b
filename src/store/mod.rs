//! Configuration storage subsystem.
//!
//! # Data Flow
//! ```text
//! RefreshScheduler
//!     → ConfigStore::swap (serialized, atomic arc-swap store)
//!     → readers observe the new snapshot on their next read()
//!     → SnapshotObservers (property bindings) notified after the swap
//!     → cache.rs persists the snapshot as last-known-good
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; a change is always a whole new snapshot
//! - Reads never take a lock
//! - Observers are held weakly so dropping a binding unregisters it

pub mod cache;
pub mod config_store;
pub mod snapshot;

pub use cache::{CacheError, SnapshotCache};
pub use config_store::{ConfigStore, SnapshotObserver, SwapOutcome};
pub use snapshot::ConfigSnapshot;
