//! Store capability trait for pluggable backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::{
    ActionName, DocMetadata, Document, GetResponse, ModulePath, NextStoresStream, RetrievedDoc,
    StoreStream,
};

/// Everything a store needs to perform one action on one module.
#[derive(Debug, Clone, Copy)]
pub struct StoreRequest<'a> {
    /// The collection or document being acted on.
    pub path: &'a ModulePath,
    /// The (already transformed) payload.
    pub payload: &'a Value,
    /// Module-level configuration for this store.
    pub store_config: &'a Value,
}

impl<'a> StoreRequest<'a> {
    /// Creates a new request.
    pub fn new(path: &'a ModulePath, payload: &'a Value, store_config: &'a Value) -> Self {
        Self {
            path,
            payload,
            store_config,
        }
    }

    /// The document id, if the request targets a document.
    pub fn doc_id(&self) -> Option<&'a str> {
        self.path.doc_id()
    }
}

/// The "apply incoming document" side of the module's data container.
///
/// Implemented by the engine; stores call it for documents they deliver
/// outside of a returned batch (e.g. from a live stream).
pub trait IncomingDocs: Send + Sync {
    /// Runs the `added` chain and reports the document. Returns the data that
    /// was applied, or `None` if the chain discarded it.
    fn added(&self, doc: RetrievedDoc) -> Option<Document>;

    /// Runs the `modified` chain and reports the modification.
    fn modified(&self, doc: RetrievedDoc) -> Option<Document>;

    /// Runs the `removed` chain and removes the document. Returns `true` if
    /// it was removed.
    fn removed(&self, id: &str, metadata: &DocMetadata) -> bool;
}

/// Mutable state handed to a store while its stream is being opened.
pub struct StreamContext<'a> {
    /// Callbacks contributed by stores earlier in the execution order.
    pub next_stores: &'a mut NextStoresStream,
    /// Where delivered documents go.
    pub incoming: Arc<dyn IncomingDocs>,
}

/// Trait implemented by every store plugin.
///
/// Only `revert` is mandatory. A store advertises the actions it supports
/// through [`StoreCapability::implements`]; the engine never calls an
/// action the store does not implement.
#[async_trait]
pub trait StoreCapability: Send + Sync + std::fmt::Debug + 'static {
    /// Return the store type name (e.g., "memory").
    fn store_type(&self) -> &str;

    /// Whether this store implements `action`.
    fn implements(&self, action: ActionName) -> bool;

    /// Fetch documents. Documents may be returned as a batch or reported
    /// through `incoming` directly.
    async fn get(
        &self,
        request: StoreRequest<'_>,
        incoming: &dyn IncomingDocs,
    ) -> AppResult<GetResponse> {
        let _ = (request, incoming);
        Err(unsupported(self.store_type(), ActionName::Get))
    }

    /// Insert a document. Returns the generated id when the request
    /// targeted a collection.
    async fn insert(&self, request: StoreRequest<'_>) -> AppResult<Option<String>> {
        let _ = request;
        Err(unsupported(self.store_type(), ActionName::Insert))
    }

    /// Deep-merge the payload into the document.
    async fn merge(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        let _ = request;
        Err(unsupported(self.store_type(), ActionName::Merge))
    }

    /// Shallow-assign the payload onto the document.
    async fn assign(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        let _ = request;
        Err(unsupported(self.store_type(), ActionName::Assign))
    }

    /// Replace the document with the payload.
    async fn replace(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        let _ = request;
        Err(unsupported(self.store_type(), ActionName::Replace))
    }

    /// Remove the properties named by the payload.
    async fn delete_prop(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        let _ = request;
        Err(unsupported(self.store_type(), ActionName::DeleteProp))
    }

    /// Delete the document (or the ids named by the payload).
    async fn delete(&self, request: StoreRequest<'_>) -> AppResult<()> {
        let _ = request;
        Err(unsupported(self.store_type(), ActionName::Delete))
    }

    /// Open a live subscription. `Ok(None)` means the store does not keep
    /// anything open for this request.
    async fn stream(
        &self,
        request: StoreRequest<'_>,
        context: StreamContext<'_>,
    ) -> AppResult<Option<StoreStream>> {
        let _ = (request, context);
        Err(unsupported(self.store_type(), ActionName::Stream))
    }

    /// Compensate a previously applied `action`.
    async fn revert(&self, action: ActionName, request: StoreRequest<'_>) -> AppResult<()>;
}

fn unsupported(store_type: &str, action: ActionName) -> AppError {
    AppError::not_implemented(format!(
        "Store type '{store_type}' does not implement '{action}'"
    ))
}
