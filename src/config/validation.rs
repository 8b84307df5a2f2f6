//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Validate addresses and the fallback redirect URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a [`ProxyConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("sites.fallback_url: '{0}' is not an absolute URL")]
    InvalidFallbackUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("sites.root_dir must not be empty")]
    EmptyRootDir,
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.sites.root_dir.trim().is_empty() {
        errors.push(ValidationError::EmptyRootDir);
    }
    if Url::parse(&config.sites.fallback_url).is_err() {
        errors.push(ValidationError::InvalidFallbackUrl(config.sites.fallback_url.clone()));
    }

    let non_zero = [
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
        ("listener.request_timeout_secs", config.listener.request_timeout_secs),
        ("sites.cache_ttl_secs", config.sites.cache_ttl_secs),
        ("egress.handshake_timeout_secs", config.egress.handshake_timeout_secs),
        ("egress.request_timeout_secs", config.egress.request_timeout_secs),
        ("egress.max_attempts", u64::from(config.egress.max_attempts)),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
