//! Documents exchanged between stores and the engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document data: a JSON object.
pub type Document = Map<String, Value>;

/// Metadata a store attaches to a retrieved document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Id of the document the metadata belongs to.
    #[serde(default)]
    pub id: String,
    /// Whether the document exists in the store that reported it.
    #[serde(default = "default_exists")]
    pub exists: bool,
    /// When the store last saw this document change.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_exists() -> bool {
    true
}

impl DocMetadata {
    /// Metadata for an existing document, stamped now.
    pub fn now(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            exists: true,
            updated_at: Some(Utc::now()),
        }
    }
}

/// A document as reported by a store's `get` or `stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDoc {
    /// Document id within its collection.
    pub id: String,
    /// Document data.
    pub data: Document,
    /// Store-provided metadata.
    #[serde(default)]
    pub metadata: DocMetadata,
}

impl RetrievedDoc {
    /// Creates a retrieved document stamped with the current time.
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        let id = id.into();
        Self {
            metadata: DocMetadata::now(id.clone()),
            id,
            data,
        }
    }
}

/// Rewrites a document arriving from `get` or `stream`. `None` discards it.
pub type OnAddedFn = Arc<dyn Fn(Document, &DocMetadata) -> Option<Document> + Send + Sync>;

/// Rewrites a modification arriving from an open stream. `None` discards it.
pub type OnModifiedFn = Arc<dyn Fn(Document, &DocMetadata) -> Option<Document> + Send + Sync>;

/// Filters a removal arriving from an open stream. `None` keeps the document.
pub type OnRemovedFn = Arc<dyn Fn(String, &DocMetadata) -> Option<String> + Send + Sync>;

/// Converts a JSON value into a document, treating non-objects as empty.
pub fn to_document(value: &Value) -> Document {
    match value {
        Value::Object(map) => map.clone(),
        _ => Document::new(),
    }
}

/// Recursively merges `incoming` into `target`; nested objects merge,
/// everything else overwrites.
pub fn deep_merge(target: &mut Document, incoming: Document) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                deep_merge(existing, nested);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}
