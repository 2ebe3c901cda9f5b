//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, backoff bounds ordered)
//! - Check that enabled features have usable addresses and credentials
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let service = &config.service;
    match Url::parse(&service.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "service.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("service.base_url", e.to_string())),
    }
    if service.application.trim().is_empty() {
        errors.push(ValidationError::new("service.application", "must not be empty"));
    }
    if service.profile.trim().is_empty() {
        errors.push(ValidationError::new("service.profile", "must not be empty"));
    }
    if service.username.is_some() != service.password.is_some() {
        errors.push(ValidationError::new(
            "service.username",
            "username and password must be set together",
        ));
    }

    let refresh = &config.refresh;
    if refresh.interval_secs == 0 {
        errors.push(ValidationError::new("refresh.interval_secs", "must be greater than 0"));
    }
    if refresh.request_timeout_ms == 0 {
        errors.push(ValidationError::new("refresh.request_timeout_ms", "must be greater than 0"));
    }
    if refresh.base_backoff_ms == 0 {
        errors.push(ValidationError::new("refresh.base_backoff_ms", "must be greater than 0"));
    }
    if refresh.max_backoff_ms < refresh.base_backoff_ms {
        errors.push(ValidationError::new(
            "refresh.max_backoff_ms",
            "must be greater than or equal to refresh.base_backoff_ms",
        ));
    }
    if refresh.error_backoff_multiplier == 0 {
        errors.push(ValidationError::new("refresh.error_backoff_multiplier", "must be at least 1"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let admin = &config.admin;
    if admin.enabled {
        if admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new(
                "admin.api_key",
                "required when the admin API is enabled",
            ));
        }
        if admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
