//! Unified error types for Tandem.
//!
//! Store plugins, hooks, and the orchestration engine all report failures
//! as [`AppError`]. The engine never wraps a store's error: whatever a store
//! action returned is what the caller receives.

use std::fmt;
use thiserror::Error;

/// Error kind categorization used across every Tandem crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// No store is configured to execute the requested action.
    NoStoresConfigured,
    /// The execution order names a store that is not registered.
    UnknownStore,
    /// A store action rejected.
    StoreActionFailed,
    /// A compensating `revert` call failed.
    RevertFailed,
    /// A stream could not be opened or ended with an error.
    StreamFailed,
    /// A hook callback failed.
    HookFailed,
    /// A module path could not be parsed.
    InvalidPath,
    /// Input validation failed.
    Validation,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The store does not implement the requested operation.
    NotImplemented,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStoresConfigured => write!(f, "NO_STORES_CONFIGURED"),
            Self::UnknownStore => write!(f, "UNKNOWN_STORE"),
            Self::StoreActionFailed => write!(f, "STORE_ACTION_FAILED"),
            Self::RevertFailed => write!(f, "REVERT_FAILED"),
            Self::StreamFailed => write!(f, "STREAM_FAILED"),
            Self::HookFailed => write!(f, "HOOK_FAILED"),
            Self::InvalidPath => write!(f, "INVALID_PATH"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout Tandem.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a no-stores-configured error.
    pub fn no_stores_configured(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoStoresConfigured, message)
    }

    /// Create an unknown-store error.
    pub fn unknown_store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownStore, message)
    }

    /// Create a store-action-failed error.
    pub fn store_action_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreActionFailed, message)
    }

    /// Create a revert-failed error.
    pub fn revert_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RevertFailed, message)
    }

    /// Create a stream-failed error.
    pub fn stream_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StreamFailed, message)
    }

    /// Create a hook-failed error.
    pub fn hook_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HookFailed, message)
    }

    /// Create an invalid-path error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPath, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a not-implemented error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::with_source(
            ErrorKind::Validation,
            format!("Invalid settings: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::store_action_failed("remote unreachable");
        assert_eq!(err.to_string(), "STORE_ACTION_FAILED: remote unreachable");
    }

    #[test]
    fn test_clone_keeps_kind_and_message() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = AppError::from(parse_err);
        let cloned = err.clone();
        assert_eq!(cloned.kind, ErrorKind::Serialization);
        assert_eq!(cloned.message, err.message);
        assert!(cloned.source.is_none());
    }
}
