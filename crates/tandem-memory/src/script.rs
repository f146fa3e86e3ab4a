//! Events a memory store emits while a stream is open.

use serde_json::Value;

use tandem_core::types::{RetrievedDoc, to_document};

/// One scripted stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedEvent {
    /// A document appeared.
    Added(RetrievedDoc),
    /// A document changed; only the given fields are reported.
    Modified(RetrievedDoc),
    /// A document was removed.
    Removed(String),
}

impl ScriptedEvent {
    /// An `Added` event from JSON data.
    pub fn added(id: &str, data: Value) -> Self {
        Self::Added(RetrievedDoc::new(id, to_document(&data)))
    }

    /// A `Modified` event from JSON data.
    pub fn modified(id: &str, data: Value) -> Self {
        Self::Modified(RetrievedDoc::new(id, to_document(&data)))
    }

    /// A `Removed` event.
    pub fn removed(id: &str) -> Self {
        Self::Removed(id.to_string())
    }

    /// Id of the document the event is about.
    pub fn id(&self) -> &str {
        match self {
            Self::Added(doc) | Self::Modified(doc) => &doc.id,
            Self::Removed(id) => id,
        }
    }
}
