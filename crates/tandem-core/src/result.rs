//! Convenience result type alias for Tandem.

use crate::error::AppError;

/// A specialized `Result` type for Tandem operations.
pub type AppResult<T> = Result<T, AppError>;
