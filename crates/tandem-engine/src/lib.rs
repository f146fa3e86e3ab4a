//! # tandem-engine
//!
//! Drives ordered stores through one action at a time:
//!
//! - Store registry and layered configuration (global, module, call)
//! - Payload and read-response transform chains
//! - Action Executor: one store's `before → action → success | error` turn
//! - Action Dispatcher: execution order, stop and revert control flow
//! - Stream Dispatcher and the open-streams registry
//! - Data containers and module handles

pub mod config;
pub mod control;
pub mod data;
pub mod dispatcher;
pub mod executor;
pub mod module;
pub mod open_streams;
pub mod registry;
pub mod stream;
pub mod transform;

pub use config::{ActionConfig, GlobalConfig, ModuleConfig, ResolvedAction, resolve_action};
pub use control::{ExecutionControl, StopExecution};
pub use data::{DataContainer, IncomingPipeline};
pub use dispatcher::ActionDispatcher;
pub use executor::{StoreTurn, TurnOutcome, execute_turn};
pub use module::{Module, Orchestrator};
pub use open_streams::{OpenStreams, StreamKey, StreamSubscription};
pub use registry::StoreRegistry;
pub use stream::StreamDispatcher;
pub use transform::{PayloadTransform, PayloadTransforms, ReadResponseTransforms};
