//! Reactive data container and the incoming-document pipeline feeding it.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use tandem_core::traits::store::IncomingDocs;
use tandem_core::types::{DocMetadata, Document, OnAddedFn, RetrievedDoc};

use crate::transform::{ReadResponseTransforms, apply_doc_chain, apply_removed_chain};

/// Documents of one collection as seen by callers, keyed by id.
///
/// Incoming data merges field by field: a later report for the same id
/// overwrites only the fields it carries.
#[derive(Debug, Default)]
pub struct DataContainer {
    docs: DashMap<String, Document>,
}

impl DataContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges an added document.
    pub fn apply_added(&self, id: &str, data: Document) {
        self.merge_fields(id, data);
    }

    /// Merges a modification.
    pub fn apply_modified(&self, id: &str, data: Document) {
        self.merge_fields(id, data);
    }

    /// Removes a document. Returns `true` if it was present.
    pub fn apply_removed(&self, id: &str) -> bool {
        self.docs.remove(id).is_some()
    }

    fn merge_fields(&self, id: &str, data: Document) {
        let mut entry = self.docs.entry(id.to_string()).or_default();
        for (field, value) in data {
            entry.insert(field, value);
        }
    }

    /// A copy of one document.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.docs.get(id).map(|doc| doc.clone())
    }

    /// A copy of every document, ordered by id.
    pub fn snapshot(&self) -> BTreeMap<String, Document> {
        self.docs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Whether a document with `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns `true` if the container holds no document.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Removes every document.
    pub fn clear(&self) {
        self.docs.clear();
    }
}

/// Applies the read-response chain to incoming documents and reports the
/// survivors to a container.
///
/// Appliers returned by `get` as "documents will arrive later" run after the
/// read-response chain, for every document reported by later stores.
pub struct IncomingPipeline {
    container: Arc<DataContainer>,
    transforms: ReadResponseTransforms,
    appliers: Vec<OnAddedFn>,
}

impl IncomingPipeline {
    /// Creates a pipeline reporting into `container`.
    pub fn new(container: Arc<DataContainer>, transforms: ReadResponseTransforms) -> Self {
        Self {
            container,
            transforms,
            appliers: Vec::new(),
        }
    }

    /// Adds an applier for documents reported from now on.
    pub fn push_added(&mut self, applier: OnAddedFn) {
        self.appliers.push(applier);
    }

    /// Number of registered appliers.
    pub fn applier_count(&self) -> usize {
        self.appliers.len()
    }
}

fn metadata_for(doc: &RetrievedDoc) -> DocMetadata {
    let mut metadata = doc.metadata.clone();
    if metadata.id.is_empty() {
        metadata.id = doc.id.clone();
    }
    metadata
}

impl IncomingDocs for IncomingPipeline {
    fn added(&self, doc: RetrievedDoc) -> Option<Document> {
        let metadata = metadata_for(&doc);
        let data = apply_doc_chain(&self.transforms.added, doc.data, &metadata)
            .and_then(|data| apply_doc_chain(&self.appliers, data, &metadata));

        match data {
            Some(data) => {
                self.container.apply_added(&doc.id, data.clone());
                Some(data)
            }
            None => {
                debug!(id = %doc.id, "Incoming document discarded");
                None
            }
        }
    }

    fn modified(&self, doc: RetrievedDoc) -> Option<Document> {
        let metadata = metadata_for(&doc);
        let data = apply_doc_chain(&self.transforms.modified, doc.data, &metadata)?;
        self.container.apply_modified(&doc.id, data.clone());
        Some(data)
    }

    fn removed(&self, id: &str, metadata: &DocMetadata) -> bool {
        match apply_removed_chain(&self.transforms.removed, id.to_string(), metadata) {
            Some(id) => self.container.apply_removed(&id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tandem_core::types::to_document;

    use super::*;

    fn doc(id: &str, value: serde_json::Value) -> RetrievedDoc {
        RetrievedDoc::new(id, to_document(&value))
    }

    #[test]
    fn test_later_reports_overwrite_only_their_fields() {
        let container = DataContainer::new();
        container.apply_added("1", to_document(&json!({"name": "Bulbasaur", "type": "grass"})));
        container.apply_added("1", to_document(&json!({"name": "Bulbasaur (remote)"})));

        assert_eq!(
            container.get("1"),
            Some(to_document(&json!({"name": "Bulbasaur (remote)", "type": "grass"})))
        );
        assert!(container.apply_removed("1"));
        assert!(container.is_empty());
    }

    #[test]
    fn test_pipeline_runs_transforms_then_appliers() {
        let container = Arc::new(DataContainer::new());
        let cached = Arc::new(Mutex::new(Vec::new()));
        let transforms = ReadResponseTransforms::new().on_added(|mut data, _| {
            data.insert("seen".into(), json!(true));
            Some(data)
        });

        let mut pipeline = IncomingPipeline::new(container.clone(), transforms);
        let sink = cached.clone();
        pipeline.push_added(Arc::new(move |data, meta| {
            sink.lock().unwrap().push((meta.id.clone(), data.contains_key("seen")));
            Some(data)
        }));

        pipeline.added(doc("25", json!({"name": "Pikachu"})));
        assert_eq!(*cached.lock().unwrap(), vec![("25".to_string(), true)]);
        assert_eq!(container.get("25").unwrap().get("seen"), Some(&json!(true)));
    }

    #[test]
    fn test_pipeline_discard_and_removed_filter() {
        let container = Arc::new(DataContainer::new());
        let transforms = ReadResponseTransforms::new()
            .on_added(|data, meta| (meta.id != "0").then_some(data))
            .on_removed(|id, _| (id != "keep").then_some(id));
        let pipeline = IncomingPipeline::new(container.clone(), transforms);

        assert!(pipeline.added(doc("0", json!({"name": "Missingno"}))).is_none());
        pipeline.added(doc("keep", json!({})));
        pipeline.added(doc("drop", json!({})));

        let meta = DocMetadata::default();
        assert!(!pipeline.removed("keep", &meta));
        assert!(pipeline.removed("drop", &meta));
        assert_eq!(container.snapshot().keys().collect::<Vec<_>>(), vec!["keep"]);
    }
}
