//! # tandem-memory
//!
//! In-memory store for Tandem. Plays either role of a two-store setup: a
//! local cache that keeps what other stores deliver, or a simulated remote
//! with latency, generated ids, failure injection, and scripted streams.

pub mod script;
pub mod store;

pub use script::ScriptedEvent;
pub use store::MemoryStore;
