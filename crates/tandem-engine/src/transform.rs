//! Payload and read-response transform chains.
//!
//! Chains are declared globally, per module, and per call. Resolution
//! concatenates the levels in that order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use tandem_core::types::{
    ActionName, ActionType, DocMetadata, Document, OnAddedFn, OnModifiedFn, OnRemovedFn,
};

/// Rewrites a payload before it is handed to the stores.
pub type PayloadTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Payload transforms declared at one level.
#[derive(Clone, Default)]
pub struct PayloadTransforms {
    by_action: HashMap<ActionName, Vec<PayloadTransform>>,
    by_type: HashMap<ActionType, Vec<PayloadTransform>>,
}

impl PayloadTransforms {
    /// Creates an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transform for one action.
    pub fn on_action<F>(mut self, action: ActionName, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.by_action.entry(action).or_default().push(Arc::new(f));
        self
    }

    /// Adds a transform for every action of a type.
    pub fn on_type<F>(mut self, action_type: ActionType, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.by_type.entry(action_type).or_default().push(Arc::new(f));
        self
    }

    /// Transforms that apply to `action` at this level: type-level first,
    /// then action-level.
    fn chain_for(&self, action: ActionName) -> impl Iterator<Item = &PayloadTransform> {
        self.by_type
            .get(&action.action_type())
            .into_iter()
            .flatten()
            .chain(self.by_action.get(&action).into_iter().flatten())
    }

    /// Returns `true` if no transform is declared.
    pub fn is_empty(&self) -> bool {
        self.by_action.is_empty() && self.by_type.is_empty()
    }
}

impl fmt::Debug for PayloadTransforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: HashMap<_, _> = self.by_action.iter().map(|(k, v)| (*k, v.len())).collect();
        let types: HashMap<_, _> = self.by_type.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("PayloadTransforms")
            .field("by_action", &actions)
            .field("by_type", &types)
            .finish()
    }
}

/// Resolves the payload chain for `action` across levels.
pub fn resolve_payload_chain<'a, I>(levels: I, action: ActionName) -> Vec<PayloadTransform>
where
    I: IntoIterator<Item = Option<&'a PayloadTransforms>>,
{
    levels
        .into_iter()
        .flatten()
        .flat_map(|level| level.chain_for(action).cloned().collect::<Vec<_>>())
        .collect()
}

/// Runs `payload` through the chain; each output feeds the next transform.
pub fn apply_payload_chain(chain: &[PayloadTransform], payload: Value) -> Value {
    chain.iter().fold(payload, |payload, transform| transform(payload))
}

/// Read-response chains: rewrite documents coming in from `get`/`stream`.
#[derive(Clone, Default)]
pub struct ReadResponseTransforms {
    /// Applied to every added document.
    pub added: Vec<OnAddedFn>,
    /// Applied to every modification while a stream is open.
    pub modified: Vec<OnModifiedFn>,
    /// Applied to every removal while a stream is open.
    pub removed: Vec<OnRemovedFn>,
}

impl ReadResponseTransforms {
    /// Creates empty chains.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an `added` transform.
    pub fn on_added<F>(mut self, f: F) -> Self
    where
        F: Fn(Document, &DocMetadata) -> Option<Document> + Send + Sync + 'static,
    {
        self.added.push(Arc::new(f));
        self
    }

    /// Adds a `modified` transform.
    pub fn on_modified<F>(mut self, f: F) -> Self
    where
        F: Fn(Document, &DocMetadata) -> Option<Document> + Send + Sync + 'static,
    {
        self.modified.push(Arc::new(f));
        self
    }

    /// Adds a `removed` filter.
    pub fn on_removed<F>(mut self, f: F) -> Self
    where
        F: Fn(String, &DocMetadata) -> Option<String> + Send + Sync + 'static,
    {
        self.removed.push(Arc::new(f));
        self
    }

    fn extend_from(&mut self, other: &ReadResponseTransforms) {
        self.added.extend(other.added.iter().cloned());
        self.modified.extend(other.modified.iter().cloned());
        self.removed.extend(other.removed.iter().cloned());
    }
}

impl fmt::Debug for ReadResponseTransforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadResponseTransforms")
            .field("added", &self.added.len())
            .field("modified", &self.modified.len())
            .field("removed", &self.removed.len())
            .finish()
    }
}

/// Resolves the read-response chains across levels.
pub fn resolve_read_chain<'a, I>(levels: I) -> ReadResponseTransforms
where
    I: IntoIterator<Item = Option<&'a ReadResponseTransforms>>,
{
    let mut resolved = ReadResponseTransforms::new();
    for level in levels.into_iter().flatten() {
        resolved.extend_from(level);
    }
    resolved
}

/// Runs a document through a chain. Stops at the first `None`.
pub fn apply_doc_chain(
    chain: &[OnAddedFn],
    data: Document,
    metadata: &DocMetadata,
) -> Option<Document> {
    chain
        .iter()
        .try_fold(data, |data, transform| transform(data, metadata))
}

/// Runs a removal through the `removed` chain. Stops at the first `None`.
pub fn apply_removed_chain(
    chain: &[OnRemovedFn],
    id: String,
    metadata: &DocMetadata,
) -> Option<String> {
    chain
        .iter()
        .try_fold(id, |id, filter| filter(id, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_chain_order() {
        let global = PayloadTransforms::new()
            .on_action(ActionName::Insert, |p| {
                json!(format!("{}-g-action", p.as_str().unwrap_or("")))
            })
            .on_type(ActionType::Write, |p| json!(format!("{}-g-type", p.as_str().unwrap_or(""))));
        let call = PayloadTransforms::new()
            .on_action(ActionName::Insert, |p| json!(format!("{}-call", p.as_str().unwrap_or(""))));

        let chain = resolve_payload_chain([Some(&global), None, Some(&call)], ActionName::Insert);
        assert_eq!(chain.len(), 3);
        assert_eq!(
            apply_payload_chain(&chain, json!("p")),
            json!("p-g-type-g-action-call")
        );
    }

    #[test]
    fn test_payload_chain_skips_other_actions() {
        let global = PayloadTransforms::new()
            .on_action(ActionName::Merge, |_| json!("merged"))
            .on_type(ActionType::Read, |_| json!("read"));
        let chain = resolve_payload_chain([Some(&global)], ActionName::Delete);
        assert!(chain.is_empty());
        assert_eq!(apply_payload_chain(&chain, json!(1)), json!(1));
    }

    #[test]
    fn test_doc_chain_discards_on_none() {
        let transforms = ReadResponseTransforms::new()
            .on_added(|mut doc, _| {
                doc.insert("seen".into(), json!(true));
                Some(doc)
            })
            .on_added(|doc, _| doc.get("name").filter(|n| *n != "Missingno").map(|_| doc.clone()));

        let meta = DocMetadata::default();
        let keep = tandem_core::types::to_document(&json!({"name": "Flareon"}));
        let drop = tandem_core::types::to_document(&json!({"name": "Missingno"}));

        let kept = apply_doc_chain(&transforms.added, keep, &meta).expect("kept");
        assert_eq!(kept.get("seen"), Some(&json!(true)));
        assert!(apply_doc_chain(&transforms.added, drop, &meta).is_none());
    }

    #[test]
    fn test_read_chain_levels_concatenate() {
        let global = ReadResponseTransforms::new().on_added(|d, _| Some(d));
        let module = ReadResponseTransforms::new()
            .on_added(|d, _| Some(d))
            .on_removed(|id, _| Some(id));
        let resolved = resolve_read_chain([Some(&global), Some(&module), None]);
        assert_eq!(resolved.added.len(), 2);
        assert_eq!(resolved.removed.len(), 1);
        assert!(resolved.modified.is_empty());
    }
}
