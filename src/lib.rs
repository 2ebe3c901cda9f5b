//! Dynamic configuration client.
//!
//! Fetches key/value configuration from a remote configuration service,
//! keeps it in an atomically swapped store, and live-refreshes typed
//! bindings without restarting the host process.

pub mod admin;
pub mod binding;
pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod observability;
pub mod refresh;
pub mod store;

pub use binding::{BindingError, PropertyBinding};
pub use config::ClientConfig;
pub use fetch::{ConfigFetcher, FetchError, FetchOutcome, HttpFetcher};
pub use lifecycle::{ConfigClient, Shutdown};
pub use refresh::{RefreshOutcome, RefreshScheduler};
pub use store::{ConfigSnapshot, ConfigStore};
