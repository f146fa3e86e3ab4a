//! # tandem-hooks
//!
//! Hook system for Tandem. Provides:
//!
//! - Hook phases (`before`, `success`, `error`, `revert`) and the event hooks receive
//! - Per-level hook declarations keyed by store
//! - Hook-map resolution merging global, module, and call declarations
//! - Sequential dispatch of one phase's hooks

pub mod definitions;
pub mod dispatcher;
pub mod registry;
pub mod resolver;

pub use definitions::{AbortSignal, ActionHook, HookEvent, HookPhase, hook_fn, try_hook_fn};
pub use dispatcher::run_phase;
pub use registry::{HookDeclarations, StoreHooks};
pub use resolver::{HookMap, ResolvedHooks, resolve_hooks};
