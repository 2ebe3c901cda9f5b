//! Configuration schema definitions.
//!
//! This module defines the client's own configuration: where the remote
//! configuration service lives and how aggressively to poll it.
//! All types derive Serde traits for deserialization from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the configuration client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote configuration service location and identity.
    pub service: ServiceConfig,

    /// Polling cadence, timeouts and backoff.
    pub refresh: RefreshConfig,

    /// Last-known-good snapshot persistence.
    pub cache: CacheConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Remote configuration service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the service (e.g., "http://localhost:8888").
    pub base_url: String,

    /// Path template; `{application}`, `{profile}` and `{label}` are expanded.
    pub path: String,

    /// Application name requested from the service.
    pub application: String,

    /// Active profile(s), comma-separated.
    pub profile: String,

    /// Optional label (branch, tag) to request.
    pub label: Option<String>,

    /// Basic auth user name.
    pub username: Option<String>,

    /// Basic auth password.
    pub password: Option<String>,

    /// Bearer token (takes precedence over basic auth).
    pub token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8888".to_string(),
            path: "/{application}/{profile}".to_string(),
            application: "config-client".to_string(),
            profile: "default".to_string(),
            label: None,
            username: None,
            password: None,
            token: None,
        }
    }
}

/// Refresh scheduling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Poll interval in seconds.
    pub interval_secs: u64,

    /// Deadline for a single fetch in milliseconds.
    pub request_timeout_ms: u64,

    /// Base delay for exponential backoff in milliseconds.
    pub base_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,

    /// Base delay multiplier for invalid-response and unauthorized failures.
    pub error_backoff_multiplier: u32,

    /// Add up to 10% jitter to backoff delays.
    pub jitter: bool,

    /// Refuse to start when the initial fetch fails.
    pub fail_fast: bool,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            request_timeout_ms: 5_000,
            base_backoff_ms: 500,
            max_backoff_ms: 60_000,
            error_backoff_multiplier: 4,
            jitter: true,
            fail_fast: false,
        }
    }
}

/// Snapshot cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// File holding the last applied snapshot. Disabled when unset.
    pub snapshot_path: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
