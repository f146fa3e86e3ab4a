//! Core traits defined in `tandem-core` and implemented by other crates.

pub mod store;

pub use store::{IncomingDocs, StoreCapability, StoreRequest, StreamContext};
