//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind admin listener → Initial fetch → Spawn refresh loop → Serve admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Refresh loop finishes its poll → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger immediate refresh
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, start_with_fetcher, ConfigClient, StartupError};
