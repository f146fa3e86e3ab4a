//! # tandem-core
//!
//! Core crate for Tandem. Contains the store capability contract, settings
//! schemas, action/path/document types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Tandem crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
