//! Logging configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level: `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`.
    #[serde(default = "default_level")]
    #[validate(length(min = 1))]
    pub level: String,
    /// Log format: `"json"` or `"pretty"`.
    #[serde(default = "default_format")]
    #[validate(custom(function = "validate_format"))]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn validate_format(format: &str) -> Result<(), validator::ValidationError> {
    match format {
        "json" | "pretty" => Ok(()),
        _ => Err(validator::ValidationError::new("unknown_log_format")),
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}
