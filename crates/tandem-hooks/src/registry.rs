//! Hook declarations: hooks registered per store at one configuration level.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::definitions::{ActionHook, HookPhase};

/// Hooks for one store, one ordered list per phase.
#[derive(Debug, Clone, Default)]
pub struct StoreHooks {
    /// Run before the store action.
    pub before: Vec<Arc<dyn ActionHook>>,
    /// Run after the store action succeeded.
    pub success: Vec<Arc<dyn ActionHook>>,
    /// Run after the store action failed.
    pub error: Vec<Arc<dyn ActionHook>>,
    /// Run after the store reverted.
    pub revert: Vec<Arc<dyn ActionHook>>,
}

impl StoreHooks {
    /// Creates an empty set of hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the hooks registered for `phase`.
    pub fn phase(&self, phase: HookPhase) -> &[Arc<dyn ActionHook>] {
        match phase {
            HookPhase::Before => &self.before,
            HookPhase::Success => &self.success,
            HookPhase::Error => &self.error,
            HookPhase::Revert => &self.revert,
        }
    }

    fn phase_mut(&mut self, phase: HookPhase) -> &mut Vec<Arc<dyn ActionHook>> {
        match phase {
            HookPhase::Before => &mut self.before,
            HookPhase::Success => &mut self.success,
            HookPhase::Error => &mut self.error,
            HookPhase::Revert => &mut self.revert,
        }
    }

    /// Appends a hook to `phase`.
    pub fn push(&mut self, phase: HookPhase, hook: Arc<dyn ActionHook>) {
        self.phase_mut(phase).push(hook);
    }

    /// Appends every hook of `other`, phase by phase, after the existing ones.
    pub fn extend_from(&mut self, other: &StoreHooks) {
        for phase in HookPhase::ALL {
            self.phase_mut(phase).extend(other.phase(phase).iter().cloned());
        }
    }

    /// Total number of hooks across phases.
    pub fn len(&self) -> usize {
        HookPhase::ALL.iter().map(|p| self.phase(*p).len()).sum()
    }

    /// Returns `true` if no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hooks declared at one level (global, module, or call), keyed by store.
#[derive(Debug, Clone, Default)]
pub struct HookDeclarations {
    per_store: BTreeMap<String, StoreHooks>,
}

impl HookDeclarations {
    /// Creates an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook for a store and phase.
    pub fn register(&mut self, store: &str, phase: HookPhase, hook: Arc<dyn ActionHook>) {
        self.per_store
            .entry(store.to_string())
            .or_default()
            .push(phase, hook);
    }

    /// Builder form of [`HookDeclarations::register`].
    pub fn on(mut self, store: &str, phase: HookPhase, hook: Arc<dyn ActionHook>) -> Self {
        self.register(store, phase, hook);
        self
    }

    /// Declares a store with no hooks yet, so it still gets an entry after
    /// resolution.
    pub fn declare(mut self, store: &str) -> Self {
        self.per_store.entry(store.to_string()).or_default();
        self
    }

    /// Returns the hooks declared for a store.
    pub fn get(&self, store: &str) -> Option<&StoreHooks> {
        self.per_store.get(store)
    }

    /// Iterates stores and their hooks in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoreHooks)> {
        self.per_store.iter().map(|(name, hooks)| (name.as_str(), hooks))
    }

    /// Returns `true` if no store is declared.
    pub fn is_empty(&self) -> bool {
        self.per_store.is_empty()
    }
}
