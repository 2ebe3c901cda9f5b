//! Client configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CONFIG_CLIENT_* environment overrides
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//! ```
//!
//! This is the client's own bootstrap configuration. The values it fetches
//! from the remote service live in [`crate::store`].

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, ClientConfig, LogFormat, ObservabilityConfig, RefreshConfig,
    ServiceConfig,
};
pub use validation::{validate_config, ValidationError};
