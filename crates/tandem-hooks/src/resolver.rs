//! Hook-map resolution: merges global, module, and call declarations into
//! one hook map per store.
//!
//! Hooks for the same store and phase are concatenated level by level
//! (global first, then module, then call), preserving registration order
//! within each level. Resolution is pure and never fails.

use std::collections::BTreeMap;

use super::registry::{HookDeclarations, StoreHooks};

/// The merged hook map for one store.
pub type HookMap = StoreHooks;

/// Merged hook maps for every store mentioned at any level.
#[derive(Debug, Clone, Default)]
pub struct ResolvedHooks {
    per_store: BTreeMap<String, HookMap>,
    empty: HookMap,
}

impl ResolvedHooks {
    /// Returns the merged map for a store; stores that were never mentioned
    /// get an empty map.
    pub fn for_store(&self, store: &str) -> &HookMap {
        self.per_store.get(store).unwrap_or(&self.empty)
    }

    /// Returns whether the store was mentioned at any level.
    pub fn contains(&self, store: &str) -> bool {
        self.per_store.contains_key(store)
    }

    /// Stores with an entry, in name order.
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.per_store.keys().map(String::as_str)
    }

    /// Number of stores with an entry.
    pub fn len(&self) -> usize {
        self.per_store.len()
    }

    /// Returns `true` if no store has an entry.
    pub fn is_empty(&self) -> bool {
        self.per_store.is_empty()
    }
}

/// Merges declarations in the order given. Absent levels contribute nothing.
pub fn resolve_hooks<'a, I>(levels: I) -> ResolvedHooks
where
    I: IntoIterator<Item = Option<&'a HookDeclarations>>,
{
    let mut per_store: BTreeMap<String, HookMap> = BTreeMap::new();

    for declarations in levels.into_iter().flatten() {
        for (store, hooks) in declarations.iter() {
            per_store
                .entry(store.to_string())
                .or_default()
                .extend_from(hooks);
        }
    }

    ResolvedHooks {
        per_store,
        empty: HookMap::default(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tandem_core::types::{ActionName, ModulePath};

    use super::*;
    use crate::definitions::{HookEvent, HookPhase, hook_fn};
    use crate::dispatcher::run_phase;

    fn recording(log: &Arc<Mutex<Vec<String>>>, label: &str) -> Arc<dyn crate::ActionHook> {
        let log = log.clone();
        let label = label.to_string();
        hook_fn(move |_| log.lock().unwrap().push(label.clone()))
    }

    #[tokio::test]
    async fn test_levels_concatenate_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let global = HookDeclarations::new()
            .on("local", HookPhase::Before, recording(&log, "global-1"))
            .on("local", HookPhase::Before, recording(&log, "global-2"));
        let module =
            HookDeclarations::new().on("local", HookPhase::Before, recording(&log, "module"));
        let call = HookDeclarations::new().on("local", HookPhase::Before, recording(&log, "call"));

        let resolved = resolve_hooks([Some(&global), Some(&module), Some(&call)]);
        let map = resolved.for_store("local");
        assert_eq!(map.before.len(), 4);
        assert!(map.success.is_empty());

        let path = ModulePath::parse("pokedex").unwrap();
        let payload = json!({});
        let event = HookEvent::new(
            HookPhase::Before,
            ActionName::Insert,
            "local",
            &path,
            &payload,
            None,
        );
        run_phase(&map.before, &event).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["global-1", "global-2", "module", "call"]
        );
    }

    #[test]
    fn test_single_level_store_gets_all_phases() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let module = HookDeclarations::new().on("remote", HookPhase::Error, recording(&log, "e"));
        let resolved = resolve_hooks([None, Some(&module), None]);
        let map = resolved.for_store("remote");
        assert_eq!(map.error.len(), 1);
        assert!(map.before.is_empty());
        assert!(map.revert.is_empty());
        assert!(resolved.contains("remote"));
    }

    #[test]
    fn test_unknown_store_is_empty() {
        let resolved = resolve_hooks([None::<&HookDeclarations>, None, None]);
        assert!(resolved.is_empty());
        assert!(resolved.for_store("local").is_empty());
    }

    #[test]
    fn test_declared_store_without_hooks_gets_entry() {
        let global = HookDeclarations::new().declare("local");
        let resolved = resolve_hooks([Some(&global)]);
        assert!(resolved.contains("local"));
        assert!(resolved.for_store("local").is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let global = HookDeclarations::new()
            .on("remote", HookPhase::Success, recording(&log, "a"))
            .on("local", HookPhase::Before, recording(&log, "b"));
        let first = resolve_hooks([Some(&global)]);
        let second = resolve_hooks([Some(&global)]);
        let names_first: Vec<_> = first.store_names().collect();
        let names_second: Vec<_> = second.store_names().collect();
        assert_eq!(names_first, names_second);
        for name in names_first {
            let a = first.for_store(name);
            let b = second.for_store(name);
            for phase in HookPhase::ALL {
                let ptrs = |hooks: &[Arc<dyn crate::ActionHook>]| -> Vec<*const ()> {
                    hooks.iter().map(|h| Arc::as_ptr(h) as *const ()).collect()
                };
                let ptrs_a = ptrs(a.phase(phase));
                let ptrs_b = ptrs(b.phase(phase));
                assert_eq!(ptrs_a, ptrs_b);
            }
        }
    }
}
