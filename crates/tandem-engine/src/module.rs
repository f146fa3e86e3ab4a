//! Orchestrator and module handles.
//!
//! A [`Module`] is a collection or a document bound to its configuration and
//! data container. Every action returns the module the caller should keep
//! using: inserts into a collection hand back the new document.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::info;

use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::types::{ActionName, Document, ModulePath};

use crate::config::{ActionConfig, GlobalConfig, ModuleConfig};
use crate::data::DataContainer;
use crate::dispatcher::ActionDispatcher;
use crate::open_streams::{OpenStreams, StreamKey, StreamSubscription};
use crate::registry::StoreRegistry;
use crate::stream::StreamDispatcher;

struct OrchestratorInner {
    registry: StoreRegistry,
    global: GlobalConfig,
    open_streams: Arc<OpenStreams>,
    containers: DashMap<String, Arc<DataContainer>>,
}

/// Entry point: registered stores plus global configuration.
///
/// Cheap to clone; clones share the open-streams registry and the data
/// containers.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    /// Creates an orchestrator. Fails if the global execution order names a
    /// store that is not registered.
    pub fn new(registry: StoreRegistry, global: GlobalConfig) -> AppResult<Self> {
        if let Some(unknown) = global
            .execution_order
            .store_names()
            .find(|name| !registry.contains(name))
        {
            return Err(AppError::unknown_store(format!(
                "Global execution order names unregistered store '{unknown}'"
            )));
        }

        info!(stores = ?registry.names(), on_error = ?global.on_error, "Orchestrator ready");

        Ok(Self {
            inner: Arc::new(OrchestratorInner {
                open_streams: Arc::new(OpenStreams::new(global.stop_replaced_streams)),
                registry,
                global,
                containers: DashMap::new(),
            }),
        })
    }

    /// A collection module with no module-level configuration.
    pub fn collection(&self, path: &str) -> AppResult<Module> {
        self.collection_with(path, ModuleConfig::default())
    }

    /// A collection module.
    pub fn collection_with(&self, path: &str, config: ModuleConfig) -> AppResult<Module> {
        let path = ModulePath::parse(path)?;
        if !path.is_collection() {
            return Err(AppError::invalid_path(format!(
                "'{path}' addresses a document, not a collection"
            )));
        }
        Ok(self.module(path, Arc::new(config)))
    }

    /// A document module with no module-level configuration.
    pub fn doc(&self, path: &str) -> AppResult<Module> {
        self.doc_with(path, ModuleConfig::default())
    }

    /// A document module.
    pub fn doc_with(&self, path: &str, config: ModuleConfig) -> AppResult<Module> {
        let path = ModulePath::parse(path)?;
        if !path.is_doc() {
            return Err(AppError::invalid_path(format!(
                "'{path}' addresses a collection, not a document"
            )));
        }
        Ok(self.module(path, Arc::new(config)))
    }

    fn module(&self, path: ModulePath, config: Arc<ModuleConfig>) -> Module {
        let container = self.data(&path.collection_path());
        Module {
            orchestrator: self.clone(),
            path,
            config,
            container,
        }
    }

    /// The data container of a collection, created on first use.
    pub fn data(&self, collection: &ModulePath) -> Arc<DataContainer> {
        self.inner
            .containers
            .entry(collection.as_str().to_string())
            .or_default()
            .clone()
    }

    /// The registered stores.
    pub fn registry(&self) -> &StoreRegistry {
        &self.inner.registry
    }

    /// The global configuration.
    pub fn global(&self) -> &GlobalConfig {
        &self.inner.global
    }

    /// The open-streams registry.
    pub fn open_streams(&self) -> &OpenStreams {
        &self.inner.open_streams
    }

    /// Stops the stream request registered under `key`.
    pub fn stop_stream(&self, key: &StreamKey) -> bool {
        self.inner.open_streams.stop(key)
    }

    /// Stops the stream request registered for `payload`.
    pub fn stop_stream_for(&self, payload: &Value) -> bool {
        self.inner.open_streams.stop_payload(payload)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.inner.registry)
            .field("open_streams", &self.inner.open_streams)
            .field("containers", &self.inner.containers.len())
            .finish_non_exhaustive()
    }
}

/// A collection or document, with its configuration.
#[derive(Clone)]
pub struct Module {
    orchestrator: Orchestrator,
    path: ModulePath,
    config: Arc<ModuleConfig>,
    container: Arc<DataContainer>,
}

impl Module {
    /// The module path.
    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    /// The last path segment: the document id or the collection name.
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Whether this module is a document.
    pub fn is_doc(&self) -> bool {
        self.path.is_doc()
    }

    /// Whether this module is a collection.
    pub fn is_collection(&self) -> bool {
        self.path.is_collection()
    }

    /// The module configuration.
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// The collection's data container.
    pub fn container(&self) -> &Arc<DataContainer> {
        &self.container
    }

    /// The document's data as last reported, for document modules.
    pub fn data(&self) -> Option<Document> {
        self.path.doc_id().and_then(|id| self.container.get(id))
    }

    /// Every document of the collection as last reported.
    pub fn docs(&self) -> BTreeMap<String, Document> {
        self.container.snapshot()
    }

    /// A document of this collection, sharing the module configuration.
    pub fn doc(&self, id: &str) -> AppResult<Module> {
        if !self.is_collection() {
            return Err(AppError::invalid_path(format!(
                "'{}' is a document; only collections contain documents",
                self.path
            )));
        }
        Ok(self.at(self.path.child(id)?))
    }

    fn at(&self, path: ModulePath) -> Module {
        Module {
            orchestrator: self.orchestrator.clone(),
            path,
            config: self.config.clone(),
            container: self.container.clone(),
        }
    }

    /// Runs a non-streaming action through every configured store.
    pub async fn act(
        &self,
        action: ActionName,
        payload: Value,
        config: ActionConfig,
    ) -> AppResult<Module> {
        let inner = &self.orchestrator.inner;
        let dispatcher =
            ActionDispatcher::new(&inner.registry, &inner.global, &self.config, &self.container);
        let path = dispatcher.dispatch(action, &self.path, payload, &config).await?;
        Ok(if path == self.path { self.clone() } else { self.at(path) })
    }

    /// Fetches documents into the data container.
    pub async fn get(&self, payload: Value, config: ActionConfig) -> AppResult<Module> {
        self.act(ActionName::Get, payload, config).await
    }

    /// Inserts a document. On a collection, returns the inserted document
    /// when a store generated an id.
    pub async fn insert(&self, payload: Value, config: ActionConfig) -> AppResult<Module> {
        self.act(ActionName::Insert, payload, config).await
    }

    /// Deep-merges the payload.
    pub async fn merge(&self, payload: Value, config: ActionConfig) -> AppResult<Module> {
        self.act(ActionName::Merge, payload, config).await
    }

    /// Shallow-assigns the payload.
    pub async fn assign(&self, payload: Value, config: ActionConfig) -> AppResult<Module> {
        self.act(ActionName::Assign, payload, config).await
    }

    /// Replaces the document with the payload.
    pub async fn replace(&self, payload: Value, config: ActionConfig) -> AppResult<Module> {
        self.act(ActionName::Replace, payload, config).await
    }

    /// Removes the properties named by the payload.
    pub async fn delete_prop(&self, payload: Value, config: ActionConfig) -> AppResult<Module> {
        self.act(ActionName::DeleteProp, payload, config).await
    }

    /// Deletes the document, or the ids named by the payload.
    pub async fn delete(&self, payload: Value, config: ActionConfig) -> AppResult<Module> {
        self.act(ActionName::Delete, payload, config).await
    }

    /// Opens a stream request. Await the returned subscription to wait for
    /// the streams to end.
    pub async fn stream(
        &self,
        payload: Value,
        config: ActionConfig,
    ) -> AppResult<StreamSubscription> {
        let inner = &self.orchestrator.inner;
        StreamDispatcher::new(
            &inner.registry,
            &inner.global,
            &self.config,
            &self.container,
            &inner.open_streams,
        )
        .open(&self.path, payload, &config)
        .await
    }

    /// Stops the stream request opened with `payload`.
    pub fn close_stream(&self, payload: &Value) -> bool {
        self.orchestrator.stop_stream_for(payload)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("path", &self.path)
            .field("docs", &self.container.len())
            .finish_non_exhaustive()
    }
}
