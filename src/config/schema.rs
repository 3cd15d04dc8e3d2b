//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::routing::{DEFAULT_JSON_LIMIT, DEFAULT_POWERED_BY, DEFAULT_UPLOAD_LIMIT};
use crate::validation::DEFAULT_FAILURE_STATUS;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Error response settings.
    pub errors: ErrorsConfig,

    /// Validator defaults.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Request body limits, in bytes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum JSON body size.
    pub json_body_bytes: usize,

    /// Default maximum raw upload size when an endpoint sets none.
    pub upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            json_body_bytes: DEFAULT_JSON_LIMIT,
            upload_bytes: DEFAULT_UPLOAD_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// Value of the `X-Powered-By` header on error responses.
    pub powered_by: String,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            powered_by: DEFAULT_POWERED_BY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Status used when a type check fails and the validator sets none.
    pub failure_status: u16,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            failure_status: DEFAULT_FAILURE_STATUS.as_u16(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
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
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
