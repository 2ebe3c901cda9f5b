//! Fetch error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Why a single fetch against the configuration service failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, reset, DNS failure, body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// The fetch did not complete within its deadline.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered, but not with a usable configuration document.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The service rejected our credentials.
    #[error("unauthorized: service returned status {0}")]
    Unauthorized(u16),
}

/// Backoff class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Likely to clear on its own; retried at the base backoff.
    Transient,
    /// Needs the service (or its operator) to change; retried at a longer backoff.
    Persistent,
}

impl FetchError {
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => FailureClass::Transient,
            FetchError::InvalidResponse(_) | FetchError::Unauthorized(_) => {
                FailureClass::Persistent
            }
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::InvalidResponse(_) => "invalid_response",
            FetchError::Unauthorized(_) => "unauthorized",
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(FetchError::Network("reset".into()).class(), FailureClass::Transient);
        assert_eq!(FetchError::Timeout(Duration::from_secs(1)).class(), FailureClass::Transient);
        assert_eq!(FetchError::InvalidResponse("bad".into()).class(), FailureClass::Persistent);
        assert_eq!(FetchError::Unauthorized(401).class(), FailureClass::Persistent);
    }
}
