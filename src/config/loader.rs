//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::ClientConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let config = read_config(path)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn read_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Full startup resolution: optional file (or defaults), then process
/// environment overrides, then validation.
pub fn resolve_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ClientConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `CONFIG_CLIENT_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("CONFIG_CLIENT_SERVICE_URL") {
        config.service.base_url = v;
    }
    if let Some(v) = lookup("CONFIG_CLIENT_APPLICATION") {
        config.service.application = v;
    }
    if let Some(v) = lookup("CONFIG_CLIENT_PROFILE") {
        config.service.profile = v;
    }
    if let Some(v) = lookup("CONFIG_CLIENT_LABEL") {
        config.service.label = Some(v).filter(|l| !l.is_empty());
    }
    if let Some(v) = lookup("CONFIG_CLIENT_POLL_INTERVAL_SECS") {
        config.refresh.interval_secs = parse_env("CONFIG_CLIENT_POLL_INTERVAL_SECS", v)?;
    }
    if let Some(v) = lookup("CONFIG_CLIENT_REQUEST_TIMEOUT_MS") {
        config.refresh.request_timeout_ms = parse_env("CONFIG_CLIENT_REQUEST_TIMEOUT_MS", v)?;
    }
    if let Some(v) = lookup("CONFIG_CLIENT_MAX_BACKOFF_MS") {
        config.refresh.max_backoff_ms = parse_env("CONFIG_CLIENT_MAX_BACKOFF_MS", v)?;
    }
    if let Some(v) = lookup("CONFIG_CLIENT_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    Ok(())
}

fn parse_env<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
