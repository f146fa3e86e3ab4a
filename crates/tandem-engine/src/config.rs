//! Layered configuration: global, module, and call.
//!
//! Scalar settings (`on_error`, execution order) take the most specific
//! level that sets them. Hooks and transform chains are concatenated across
//! levels, global first.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use tandem_core::config::EngineSettings;
use tandem_core::config::execution::ExecutionOrderTable;
use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::types::{ActionName, OnErrorPolicy};
use tandem_hooks::{HookDeclarations, ResolvedHooks, resolve_hooks};

use crate::open_streams::StreamKey;
use crate::registry::StoreRegistry;
use crate::transform::{
    PayloadTransform, PayloadTransforms, ReadResponseTransforms, resolve_payload_chain,
    resolve_read_chain,
};

static NO_STORE_CONFIG: Value = Value::Null;

/// Settings shared by every module of an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    /// Error policy when neither module nor call sets one.
    pub on_error: OnErrorPolicy,
    /// Execution order per action or action type.
    pub execution_order: ExecutionOrderTable,
    /// Hooks per store.
    pub on: HookDeclarations,
    /// Payload transforms.
    pub modify_payload_on: PayloadTransforms,
    /// Read-response transforms.
    pub modify_read_response_on: ReadResponseTransforms,
    /// Stop replaced registrations in the open-streams registry.
    pub stop_replaced_streams: bool,
}

impl From<&EngineSettings> for GlobalConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            on_error: settings.on_error,
            execution_order: settings.execution_order.clone(),
            stop_replaced_streams: settings.streams.stop_replaced,
            ..Self::default()
        }
    }
}

impl GlobalConfig {
    /// Sets the hooks.
    pub fn with_hooks(mut self, on: HookDeclarations) -> Self {
        self.on = on;
        self
    }

    /// Sets the payload transforms.
    pub fn with_payload_transforms(mut self, transforms: PayloadTransforms) -> Self {
        self.modify_payload_on = transforms;
        self
    }

    /// Sets the read-response transforms.
    pub fn with_read_transforms(mut self, transforms: ReadResponseTransforms) -> Self {
        self.modify_read_response_on = transforms;
        self
    }
}

/// Settings for one module (a collection and the documents in it).
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    /// Overrides the global error policy.
    pub on_error: Option<OnErrorPolicy>,
    /// Overrides the global execution order per action or action type.
    pub execution_order: ExecutionOrderTable,
    /// Hooks per store, run after the global ones.
    pub on: HookDeclarations,
    /// Payload transforms, run after the global ones.
    pub modify_payload_on: PayloadTransforms,
    /// Read-response transforms, run after the global ones.
    pub modify_read_response_on: ReadResponseTransforms,
    /// Store-specific configuration handed to every action of that store.
    pub config_per_store: HashMap<String, Value>,
}

impl ModuleConfig {
    /// Creates an empty module configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the error policy.
    pub fn on_error(mut self, policy: OnErrorPolicy) -> Self {
        self.on_error = Some(policy);
        self
    }

    /// Sets the execution order table.
    pub fn with_execution_order(mut self, table: ExecutionOrderTable) -> Self {
        self.execution_order = table;
        self
    }

    /// Sets the hooks.
    pub fn with_hooks(mut self, on: HookDeclarations) -> Self {
        self.on = on;
        self
    }

    /// Sets the payload transforms.
    pub fn with_payload_transforms(mut self, transforms: PayloadTransforms) -> Self {
        self.modify_payload_on = transforms;
        self
    }

    /// Sets the read-response transforms.
    pub fn with_read_transforms(mut self, transforms: ReadResponseTransforms) -> Self {
        self.modify_read_response_on = transforms;
        self
    }

    /// Sets the configuration handed to `store`.
    pub fn with_store_config(mut self, store: &str, config: Value) -> Self {
        self.config_per_store.insert(store.to_string(), config);
        self
    }

    /// The configuration for `store`, `null` when none is set.
    pub fn store_config(&self, store: &str) -> &Value {
        self.config_per_store.get(store).unwrap_or(&NO_STORE_CONFIG)
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct ActionConfig {
    /// Overrides module and global error policy.
    pub on_error: Option<OnErrorPolicy>,
    /// Overrides every configured execution order.
    pub execution_order: Option<Vec<String>>,
    /// Hooks per store, run after the module ones.
    pub on: Option<HookDeclarations>,
    /// Payload transforms, run after the module ones.
    pub modify_payload_on: Option<PayloadTransforms>,
    /// Read-response transforms, run after the module ones.
    pub modify_read_response_on: Option<ReadResponseTransforms>,
    /// Registers a stream under this key instead of the payload's.
    pub stream_key: Option<StreamKey>,
}

impl ActionConfig {
    /// A call with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the error policy.
    pub fn on_error(mut self, policy: OnErrorPolicy) -> Self {
        self.on_error = Some(policy);
        self
    }

    /// Sets the execution order.
    pub fn execution_order<I, S>(mut self, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execution_order = Some(stores.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the hooks.
    pub fn with_hooks(mut self, on: HookDeclarations) -> Self {
        self.on = Some(on);
        self
    }

    /// Sets the payload transforms.
    pub fn with_payload_transforms(mut self, transforms: PayloadTransforms) -> Self {
        self.modify_payload_on = Some(transforms);
        self
    }

    /// Sets the read-response transforms.
    pub fn with_read_transforms(mut self, transforms: ReadResponseTransforms) -> Self {
        self.modify_read_response_on = Some(transforms);
        self
    }

    /// Sets the stream key.
    pub fn stream_key(mut self, key: impl Into<String>) -> Self {
        self.stream_key = Some(StreamKey::new(key));
        self
    }
}

/// Everything one call needs, resolved from the three levels.
pub struct ResolvedAction {
    /// The action being run.
    pub action: ActionName,
    /// Effective error policy.
    pub on_error: OnErrorPolicy,
    /// Merged hook maps.
    pub hooks: ResolvedHooks,
    /// Stores to visit, in order. Never empty; every name is registered.
    pub execution_order: Vec<String>,
    /// Payload transforms, in application order.
    pub payload_chain: Vec<PayloadTransform>,
    /// Read-response transforms, in application order.
    pub read_chain: ReadResponseTransforms,
}

impl fmt::Debug for ResolvedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAction")
            .field("action", &self.action)
            .field("on_error", &self.on_error)
            .field("hooks", &self.hooks)
            .field("execution_order", &self.execution_order)
            .field("payload_chain", &self.payload_chain.len())
            .field("read_chain", &self.read_chain)
            .finish()
    }
}

/// Resolves the configuration of one call.
pub fn resolve_action(
    action: ActionName,
    registry: &StoreRegistry,
    global: &GlobalConfig,
    module: &ModuleConfig,
    call: &ActionConfig,
) -> AppResult<ResolvedAction> {
    let on_error = call
        .on_error
        .or(module.on_error)
        .unwrap_or(global.on_error);

    let execution_order = resolve_execution_order(action, global, module, call);
    if execution_order.is_empty() {
        return Err(AppError::no_stores_configured(format!(
            "No execution order configured for '{action}'"
        )));
    }
    if let Some(unknown) = execution_order.iter().find(|name| !registry.contains(name)) {
        return Err(AppError::unknown_store(format!(
            "Execution order for '{action}' names unregistered store '{unknown}'"
        )));
    }

    let hooks = resolve_hooks([Some(&global.on), Some(&module.on), call.on.as_ref()]);
    let payload_chain = resolve_payload_chain(
        [
            Some(&global.modify_payload_on),
            Some(&module.modify_payload_on),
            call.modify_payload_on.as_ref(),
        ],
        action,
    );
    let read_chain = resolve_read_chain([
        Some(&global.modify_read_response_on),
        Some(&module.modify_read_response_on),
        call.modify_read_response_on.as_ref(),
    ]);

    debug!(
        action = %action,
        on_error = ?on_error,
        stores = ?execution_order,
        payload_transforms = payload_chain.len(),
        "Resolved action configuration"
    );

    Ok(ResolvedAction {
        action,
        on_error,
        hooks,
        execution_order,
        payload_chain,
        read_chain,
    })
}

fn resolve_execution_order(
    action: ActionName,
    global: &GlobalConfig,
    module: &ModuleConfig,
    call: &ActionConfig,
) -> Vec<String> {
    let action_type = action.action_type();
    call.execution_order
        .as_deref()
        .or_else(|| module.execution_order.for_action(action))
        .or_else(|| module.execution_order.for_type(action_type))
        .or_else(|| global.execution_order.for_action(action))
        .or_else(|| global.execution_order.for_type(action_type))
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}
