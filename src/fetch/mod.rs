//! Configuration fetching subsystem.
//!
//! # Data Flow
//! ```text
//! RefreshScheduler
//!     → ConfigFetcher::fetch(last_version)
//!     → http.rs (one conditional GET, no retries)
//!     → wire.rs (decode flat or environment document)
//!     → FetchOutcome::Updated(snapshot) | FetchOutcome::Unchanged | FetchError
//! ```
//!
//! # Design Decisions
//! - Exactly one outbound request per fetch; retrying belongs to the scheduler
//! - Unchanged is reported both for 304 and for a body carrying the known version

use std::future::Future;

pub mod error;
pub mod http;
pub mod wire;

pub use error::{FailureClass, FetchError};
pub use http::HttpFetcher;

use crate::store::ConfigSnapshot;

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The service returned a snapshot with a version other than the one we hold.
    Updated(ConfigSnapshot),
    /// The service reported no change since the supplied version.
    Unchanged,
}

/// One request/response cycle against the configuration service.
pub trait ConfigFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        last_version: Option<&str>,
    ) -> impl Future<Output = Result<FetchOutcome, FetchError>> + Send;
}
