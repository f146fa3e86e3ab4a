//! Shared test helpers for engine integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::traits::store::{IncomingDocs, StoreCapability, StoreRequest, StreamContext};
use tandem_core::types::{ActionName, GetResponse, RetrievedDoc, StoreStream, to_document};
use tandem_engine::{GlobalConfig, Orchestrator, StoreRegistry};
use tandem_hooks::{HookDeclarations, HookPhase, hook_fn};

/// Shared event log.
pub type Log = Arc<Mutex<Vec<String>>>;

/// Create an empty log.
pub fn new_log() -> Log {
    Arc::default()
}

/// Snapshot of a log.
pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A store that records every call as `"{name}:{action}"`.
#[derive(Debug)]
pub struct RecordingStore {
    name: String,
    log: Log,
    paths: Log,
    configs: Mutex<Vec<Value>>,
    missing: HashSet<ActionName>,
    failing: HashSet<ActionName>,
    failing_revert: bool,
    insert_id: Option<String>,
    docs: Vec<RetrievedDoc>,
    stream_fails_after: Option<Duration>,
}

impl RecordingStore {
    /// Create a store implementing every action.
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            paths: new_log(),
            configs: Mutex::new(Vec::new()),
            missing: HashSet::new(),
            failing: HashSet::new(),
            failing_revert: false,
            insert_id: None,
            docs: Vec::new(),
            stream_fails_after: None,
        }
    }

    /// The store does not implement `action`.
    pub fn without(mut self, action: ActionName) -> Self {
        self.missing.insert(action);
        self
    }

    /// `action` fails with `"{name} failed"`.
    pub fn failing(mut self, action: ActionName) -> Self {
        self.failing.insert(action);
        self
    }

    /// `revert` fails.
    pub fn failing_revert(mut self) -> Self {
        self.failing_revert = true;
        self
    }

    /// `insert` on a collection returns `id`.
    pub fn generating_id(mut self, id: &str) -> Self {
        self.insert_id = Some(id.to_string());
        self
    }

    /// `get` returns these documents.
    pub fn with_docs(mut self, docs: Vec<(&str, Value)>) -> Self {
        self.docs = docs
            .into_iter()
            .map(|(id, data)| RetrievedDoc::new(id, to_document(&data)))
            .collect();
        self
    }

    /// An opened stream fails after `delay`.
    pub fn stream_failing_after(mut self, delay: Duration) -> Self {
        self.stream_fails_after = Some(delay);
        self
    }

    /// Paths this store was called with, in call order.
    pub fn paths(&self) -> Vec<String> {
        entries(&self.paths)
    }

    /// Store configs this store was called with, in call order.
    pub fn configs(&self) -> Vec<Value> {
        self.configs.lock().unwrap().clone()
    }

    fn call(&self, action: ActionName, request: &StoreRequest<'_>) -> AppResult<()> {
        self.log.lock().unwrap().push(format!("{}:{action}", self.name));
        self.paths
            .lock()
            .unwrap()
            .push(request.path.as_str().to_string());
        self.configs.lock().unwrap().push(request.store_config.clone());
        if self.failing.contains(&action) {
            return Err(AppError::store_action_failed(format!("{} failed", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreCapability for RecordingStore {
    fn store_type(&self) -> &str {
        "recording"
    }

    fn implements(&self, action: ActionName) -> bool {
        !self.missing.contains(&action)
    }

    async fn get(
        &self,
        request: StoreRequest<'_>,
        _incoming: &dyn IncomingDocs,
    ) -> AppResult<GetResponse> {
        self.call(ActionName::Get, &request)?;
        Ok(GetResponse::Docs(self.docs.clone()))
    }

    async fn insert(&self, request: StoreRequest<'_>) -> AppResult<Option<String>> {
        self.call(ActionName::Insert, &request)?;
        Ok(request
            .path
            .is_collection()
            .then(|| self.insert_id.clone())
            .flatten())
    }

    async fn merge(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.call(ActionName::Merge, &request)?;
        Ok(request.payload.clone())
    }

    async fn assign(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.call(ActionName::Assign, &request)?;
        Ok(request.payload.clone())
    }

    async fn replace(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.call(ActionName::Replace, &request)?;
        Ok(request.payload.clone())
    }

    async fn delete_prop(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.call(ActionName::DeleteProp, &request)?;
        Ok(Value::Null)
    }

    async fn delete(&self, request: StoreRequest<'_>) -> AppResult<()> {
        self.call(ActionName::Delete, &request)
    }

    async fn stream(
        &self,
        request: StoreRequest<'_>,
        _context: StreamContext<'_>,
    ) -> AppResult<Option<StoreStream>> {
        self.call(ActionName::Stream, &request)?;
        let token = CancellationToken::new();
        let stopped = token.clone();
        let fails_after = self.stream_fails_after;
        let log = self.log.clone();
        let stop_log = self.log.clone();
        let name = self.name.clone();
        let stop_name = self.name.clone();

        let streaming = async move {
            match fails_after {
                Some(delay) => tokio::select! {
                    _ = stopped.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {
                        return Err(AppError::stream_failed(format!("{name} stream broke")));
                    }
                },
                None => stopped.cancelled().await,
            }
            log.lock().unwrap().push(format!("{name}:stream-ended"));
            Ok(())
        };

        Ok(Some(StoreStream {
            streaming: streaming.boxed(),
            stop: Arc::new(move || {
                stop_log.lock().unwrap().push(format!("{stop_name}:stop"));
                token.cancel();
            }),
        }))
    }

    async fn revert(&self, action: ActionName, request: StoreRequest<'_>) -> AppResult<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:revert:{action}", self.name));
        self.paths
            .lock()
            .unwrap()
            .push(request.path.as_str().to_string());
        if self.failing_revert {
            return Err(AppError::store_action_failed(format!("{} revert failed", self.name)));
        }
        Ok(())
    }
}

/// Hooks for every phase of every store, recording `"{store}:{phase}"`.
pub fn recording_hooks(log: &Log, stores: &[&str]) -> HookDeclarations {
    let mut declarations = HookDeclarations::new();
    for store in stores {
        for phase in HookPhase::ALL {
            let log = log.clone();
            let label = format!("{store}:{phase}");
            declarations.register(
                store,
                phase,
                hook_fn(move |_| log.lock().unwrap().push(label.clone())),
            );
        }
    }
    declarations
}

/// Build an orchestrator over the given stores.
pub fn orchestrator(
    stores: Vec<(&str, Arc<dyn StoreCapability>)>,
    global: GlobalConfig,
) -> Orchestrator {
    let mut registry = StoreRegistry::new();
    for (name, store) in stores {
        registry.register(name, store).expect("store registers");
    }
    Orchestrator::new(registry, global).expect("orchestrator builds")
}

/// Upcast a concrete store for registration.
pub fn dyn_store<S: StoreCapability>(store: &Arc<S>) -> Arc<dyn StoreCapability> {
    store.clone()
}
