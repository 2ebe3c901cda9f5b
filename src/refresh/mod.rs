//! Refresh scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! interval timer / manual trigger
//!     → scheduler.rs: Idle → Fetching
//!     → ConfigFetcher::fetch(current_version), bounded by request timeout
//!     → Updated:   Applying → ConfigStore::swap → observers → Idle
//!     → Unchanged: Idle
//!     → Error:     Backoff (backoff.rs delay) → Fetching
//! ```
//!
//! # Design Decisions
//! - One loop per client; fetches never block store readers
//! - Failures never touch the installed snapshot
//! - Delays never shrink within a failure streak; a success resets them
//! - Shutdown is observed between polls, never mid-fetch

pub mod backoff;
pub mod scheduler;
pub mod state;

pub use backoff::{calculate_backoff, BackoffPolicy};
pub use scheduler::{RefreshHandle, RefreshOutcome, RefreshScheduler};
pub use state::{RefreshState, SchedulerStatus, StatusReport};
