//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, failure status is 4xx/5xx)
//! - Validate addresses and header values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderValue;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidAddress { field: &'static str, value: String },
    ZeroLimit { field: &'static str },
    InvalidStatus(u16),
    InvalidHeaderValue(String),
    UnknownLogLevel(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidAddress { field, value } => {
                write!(f, "{} is not a socket address: '{}'", field, value)
            }
            ValidationError::ZeroLimit { field } => write!(f, "{} must be greater than 0", field),
            ValidationError::InvalidStatus(status) => {
                write!(f, "validation.failure_status {} is not an error status (400-599)", status)
            }
            ValidationError::InvalidHeaderValue(value) => {
                write!(f, "errors.powered_by is not a valid header value: '{}'", value)
            }
            ValidationError::UnknownLogLevel(level) => {
                write!(f, "observability.log_level '{}' is unknown", level)
            }
        }
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.limits.json_body_bytes == 0 {
        errors.push(ValidationError::ZeroLimit {
            field: "limits.json_body_bytes",
        });
    }
    if config.limits.upload_bytes == 0 {
        errors.push(ValidationError::ZeroLimit {
            field: "limits.upload_bytes",
        });
    }
    if !(400..=599).contains(&config.validation.failure_status) {
        errors.push(ValidationError::InvalidStatus(config.validation.failure_status));
    }
    if HeaderValue::from_str(&config.errors.powered_by).is_err() {
        errors.push(ValidationError::InvalidHeaderValue(config.errors.powered_by.clone()));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
