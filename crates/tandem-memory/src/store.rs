//! In-memory store implementation using dashmap.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tandem_core::config::store::StoreSettings;
use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::traits::store::{IncomingDocs, StoreCapability, StoreRequest, StreamContext};
use tandem_core::types::{
    ActionName, DocMetadata, Document, GetResponse, ModulePath, NextStoresStream, RetrievedDoc,
    StoreStream, deep_merge, to_document,
};

use crate::script::ScriptedEvent;

/// State of one document before an action touched it.
#[derive(Debug, Clone)]
struct Undo {
    doc_path: String,
    previous: Option<Document>,
}

/// In-memory store keyed by document path.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    settings: StoreSettings,
    /// Act as a local cache: keep documents delivered by later stores.
    cache_reads: bool,
    /// Document path → data.
    docs: Arc<DashMap<String, Document>>,
    /// (action, request path) → undo batches, latest last.
    journal: Arc<DashMap<(ActionName, String), Vec<Vec<Undo>>>>,
    /// Actions that currently fail.
    failing: Arc<DashSet<ActionName>>,
    /// Events emitted by every opened stream.
    script: Arc<Vec<ScriptedEvent>>,
}

impl MemoryStore {
    /// Create a store from settings.
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            cache_reads: settings.cache_reads,
            settings,
            docs: Arc::new(DashMap::new()),
            journal: Arc::new(DashMap::new()),
            failing: Arc::new(DashSet::new()),
            script: Arc::new(Vec::new()),
        }
    }

    /// Create a store from configured settings. Only the `memory` kind is
    /// supported.
    pub fn from_settings(settings: &StoreSettings) -> AppResult<Self> {
        if settings.kind != "memory" {
            return Err(AppError::configuration(format!(
                "Unsupported store kind '{}'",
                settings.kind
            )));
        }
        Ok(Self::new(settings.clone()))
    }

    /// Keep documents delivered by later stores (local cache role).
    pub fn caching_reads(mut self) -> Self {
        self.cache_reads = true;
        self
    }

    /// Events to emit on every stream, one per interval.
    pub fn with_stream_script(mut self, script: Vec<ScriptedEvent>) -> Self {
        self.script = Arc::new(script);
        self
    }

    /// Stores a document directly, bypassing the journal.
    pub fn seed(&self, path: &str, data: Value) -> AppResult<()> {
        let path = ModulePath::parse(path)?;
        if !path.is_doc() {
            return Err(AppError::invalid_path(format!("'{path}' is not a document path")));
        }
        self.docs.insert(path.as_str().to_string(), to_document(&data));
        Ok(())
    }

    /// Makes `action` fail until [`MemoryStore::recover`] is called.
    pub fn fail_on(&self, action: ActionName) {
        self.failing.insert(action);
    }

    /// Makes `action` succeed again.
    pub fn recover(&self, action: ActionName) {
        self.failing.remove(&action);
    }

    /// A copy of the document at `path`.
    pub fn doc(&self, path: &str) -> Option<Document> {
        self.docs.get(path).map(|doc| doc.clone())
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns `true` if no document is stored.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    async fn simulate(&self, action: ActionName) -> AppResult<()> {
        if self.settings.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.latency_ms)).await;
        }
        if self.failing.contains(&action) {
            let message = format!("Memory store failed '{action}' on request");
            return Err(if action == ActionName::Stream {
                AppError::stream_failed(message)
            } else {
                AppError::store_action_failed(message)
            });
        }
        Ok(())
    }

    fn doc_path(request: &StoreRequest<'_>, action: ActionName) -> AppResult<String> {
        if !request.path.is_doc() {
            return Err(AppError::invalid_path(format!(
                "'{action}' needs a document path, got '{}'",
                request.path
            )));
        }
        Ok(request.path.as_str().to_string())
    }

    fn record(&self, action: ActionName, request: &StoreRequest<'_>, doc_paths: &[String]) {
        let batch = doc_paths
            .iter()
            .map(|doc_path| Undo {
                doc_path: doc_path.clone(),
                previous: self.doc(doc_path),
            })
            .collect();
        self.journal
            .entry((action, request.path.as_str().to_string()))
            .or_default()
            .push(batch);
    }

    fn write(
        &self,
        action: ActionName,
        request: StoreRequest<'_>,
        apply: impl FnOnce(&mut Document, Document),
    ) -> AppResult<Value> {
        let doc_path = Self::doc_path(&request, action)?;
        self.record(action, &request, std::slice::from_ref(&doc_path));
        let mut entry = self.docs.entry(doc_path).or_default();
        apply(entry.value_mut(), to_document(request.payload));
        Ok(Value::Object(entry.value().clone()))
    }

    fn collection_docs(&self, collection: &ModulePath) -> Vec<RetrievedDoc> {
        let prefix = format!("{collection}/");
        let mut docs: Vec<RetrievedDoc> = self
            .docs
            .iter()
            .filter_map(|entry| {
                let id = entry.key().strip_prefix(&prefix)?;
                (!id.contains('/')).then(|| RetrievedDoc::new(id, entry.value().clone()))
            })
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }

    fn register_downstream(&self, collection: &ModulePath, table: &mut NextStoresStream) {
        let write = |replace: bool| {
            let docs = self.docs.clone();
            let collection = collection.as_str().to_string();
            Arc::new(move |doc: &RetrievedDoc| {
                let path = format!("{collection}/{}", doc.id);
                if replace {
                    docs.insert(path, doc.data.clone());
                } else {
                    merge_fields(&docs, path, doc.data.clone());
                }
            }) as tandem_core::types::StreamWriteFn
        };

        table.inserted.push(write(false));
        table.merged.push(write(false));
        table.assigned.push(write(false));
        table.replaced.push(write(true));

        let docs = self.docs.clone();
        let collection = collection.as_str().to_string();
        table.deleted.push(Arc::new(move |id: &str| {
            docs.remove(&format!("{collection}/{id}"));
        }));
    }

    fn emission(
        &self,
        path: &ModulePath,
        earlier: NextStoresStream,
        incoming: Arc<dyn IncomingDocs>,
        token: CancellationToken,
    ) -> BoxFuture<'static, AppResult<()>> {
        let docs = self.docs.clone();
        let collection = path.collection_path().as_str().to_string();
        let only = path.doc_id().map(str::to_string);
        let script: Vec<ScriptedEvent> = self
            .script
            .iter()
            .filter(|event| only.as_deref().is_none_or(|id| event.id() == id))
            .cloned()
            .collect();
        let interval = self.settings.stream_interval_ms;

        async move {
            let start = Instant::now();
            for (index, event) in script.into_iter().enumerate() {
                let due = start + Duration::from_millis(10 + index as u64 * interval);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(collection = %collection, delivered = index, "Stream stopped");
                        return Ok(());
                    }
                    _ = tokio::time::sleep_until(due) => {}
                }
                deliver(&docs, &collection, &earlier, incoming.as_ref(), event);
            }
            token.cancelled().await;
            debug!(collection = %collection, "Stream stopped after script ended");
            Ok(())
        }
        .boxed()
    }
}

fn merge_fields(docs: &DashMap<String, Document>, path: String, data: Document) {
    let mut entry = docs.entry(path).or_default();
    for (field, value) in data {
        entry.insert(field, value);
    }
}

fn deliver(
    docs: &DashMap<String, Document>,
    collection: &str,
    earlier: &NextStoresStream,
    incoming: &dyn IncomingDocs,
    event: ScriptedEvent,
) {
    match event {
        ScriptedEvent::Added(doc) => {
            merge_fields(docs, format!("{collection}/{}", doc.id), doc.data.clone());
            earlier.notify_inserted(&doc);
            incoming.added(doc);
        }
        ScriptedEvent::Modified(doc) => {
            merge_fields(docs, format!("{collection}/{}", doc.id), doc.data.clone());
            earlier.notify_merged(&doc);
            incoming.modified(doc);
        }
        ScriptedEvent::Removed(id) => {
            docs.remove(&format!("{collection}/{id}"));
            earlier.notify_deleted(&id);
            let metadata = DocMetadata {
                id: id.clone(),
                exists: false,
                updated_at: Some(Utc::now()),
            };
            incoming.removed(&id, &metadata);
        }
    }
}

fn string_list(payload: &Value) -> Vec<String> {
    match payload {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl StoreCapability for MemoryStore {
    fn store_type(&self) -> &str {
        "memory"
    }

    fn implements(&self, _action: ActionName) -> bool {
        true
    }

    async fn get(
        &self,
        request: StoreRequest<'_>,
        incoming: &dyn IncomingDocs,
    ) -> AppResult<GetResponse> {
        self.simulate(ActionName::Get).await?;

        let docs = match request.doc_id() {
            Some(id) => self
                .doc(request.path.as_str())
                .map(|data| vec![RetrievedDoc::new(id, data)])
                .unwrap_or_default(),
            None => self.collection_docs(request.path),
        };
        debug!(path = %request.path, count = docs.len(), "Memory get");

        if !self.cache_reads {
            return Ok(GetResponse::Docs(docs));
        }

        for doc in docs {
            incoming.added(doc);
        }
        let cache = self.docs.clone();
        let collection = request.path.collection_path().as_str().to_string();
        Ok(GetResponse::OnAdded(Arc::new(
            move |data: Document, metadata: &DocMetadata| {
                merge_fields(&cache, format!("{collection}/{}", metadata.id), data.clone());
                Some(data)
            },
        )))
    }

    async fn insert(&self, request: StoreRequest<'_>) -> AppResult<Option<String>> {
        self.simulate(ActionName::Insert).await?;

        let (doc_path, generated) = if request.path.is_doc() {
            (request.path.as_str().to_string(), None)
        } else {
            let id = if self.settings.generate_ids {
                uuid::Uuid::new_v4().to_string()
            } else {
                request
                    .payload
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        AppError::validation("Insert into a collection needs an 'id' field")
                    })?
            };
            (request.path.child(&id)?.as_str().to_string(), Some(id))
        };

        self.record(ActionName::Insert, &request, std::slice::from_ref(&doc_path));
        self.docs.insert(doc_path.clone(), to_document(request.payload));
        debug!(path = %doc_path, "Memory insert");
        Ok(generated)
    }

    async fn merge(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.simulate(ActionName::Merge).await?;
        self.write(ActionName::Merge, request, |doc, incoming| deep_merge(doc, incoming))
    }

    async fn assign(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.simulate(ActionName::Assign).await?;
        self.write(ActionName::Assign, request, |doc, incoming| doc.extend(incoming))
    }

    async fn replace(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.simulate(ActionName::Replace).await?;
        self.write(ActionName::Replace, request, |doc, incoming| *doc = incoming)
    }

    async fn delete_prop(&self, request: StoreRequest<'_>) -> AppResult<Value> {
        self.simulate(ActionName::DeleteProp).await?;
        let props = string_list(request.payload);
        self.write(ActionName::DeleteProp, request, |doc, _| {
            for prop in &props {
                doc.remove(prop);
            }
        })
    }

    async fn delete(&self, request: StoreRequest<'_>) -> AppResult<()> {
        self.simulate(ActionName::Delete).await?;

        let doc_paths = if request.path.is_doc() {
            vec![request.path.as_str().to_string()]
        } else {
            string_list(request.payload)
                .iter()
                .map(|id| request.path.child(id).map(|p| p.as_str().to_string()))
                .collect::<AppResult<Vec<_>>>()?
        };

        self.record(ActionName::Delete, &request, &doc_paths);
        for doc_path in &doc_paths {
            self.docs.remove(doc_path);
        }
        debug!(path = %request.path, count = doc_paths.len(), "Memory delete");
        Ok(())
    }

    async fn stream(
        &self,
        request: StoreRequest<'_>,
        context: StreamContext<'_>,
    ) -> AppResult<Option<StoreStream>> {
        self.simulate(ActionName::Stream).await?;

        let earlier = context.next_stores.clone();
        self.register_downstream(&request.path.collection_path(), context.next_stores);

        let token = CancellationToken::new();
        let streaming = self.emission(request.path, earlier, context.incoming, token.clone());
        debug!(path = %request.path, events = self.script.len(), "Memory stream opened");

        Ok(Some(StoreStream {
            streaming,
            stop: Arc::new(move || token.cancel()),
        }))
    }

    async fn revert(&self, action: ActionName, request: StoreRequest<'_>) -> AppResult<()> {
        let key = (action, request.path.as_str().to_string());
        let batch = self
            .journal
            .get_mut(&key)
            .and_then(|mut batches| batches.pop());

        let Some(batch) = batch else {
            debug!(action = %action, path = %request.path, "Nothing to revert");
            return Ok(());
        };

        for undo in batch.into_iter().rev() {
            match undo.previous {
                Some(previous) => {
                    self.docs.insert(undo.doc_path, previous);
                }
                None => {
                    self.docs.remove(&undo.doc_path);
                }
            }
        }
        debug!(action = %action, path = %request.path, "Memory revert");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tandem_core::error::ErrorKind;

    use super::*;

    #[derive(Default)]
    struct Collected {
        added: Mutex<Vec<(String, Document)>>,
        removed: Mutex<Vec<String>>,
    }

    impl IncomingDocs for Collected {
        fn added(&self, doc: RetrievedDoc) -> Option<Document> {
            self.added.lock().unwrap().push((doc.id, doc.data.clone()));
            Some(doc.data)
        }

        fn modified(&self, doc: RetrievedDoc) -> Option<Document> {
            self.added(doc)
        }

        fn removed(&self, id: &str, _metadata: &DocMetadata) -> bool {
            self.removed.lock().unwrap().push(id.to_string());
            true
        }
    }

    fn make_store() -> MemoryStore {
        MemoryStore::new(StoreSettings {
            stream_interval_ms: 20,
            ..StoreSettings::default()
        })
    }

    fn path(p: &str) -> ModulePath {
        ModulePath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_insert_generates_id_and_revert_removes_it() {
        let store = make_store();
        let collection = path("pokedex");
        let payload = json!({"name": "Mew"});
        let request = StoreRequest::new(&collection, &payload, &Value::Null);

        let id = store.insert(request).await.unwrap().expect("generated id");
        assert_eq!(store.doc(&format!("pokedex/{id}")), Some(to_document(&payload)));

        store.revert(ActionName::Insert, request).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_insert_without_generation_needs_id() {
        let store = MemoryStore::new(StoreSettings {
            generate_ids: false,
            ..StoreSettings::default()
        });
        let collection = path("pokedex");

        let payload = json!({"name": "Mew"});
        let err = store
            .insert(StoreRequest::new(&collection, &payload, &Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let payload = json!({"id": "151", "name": "Mew"});
        let id = store
            .insert(StoreRequest::new(&collection, &payload, &Value::Null))
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("151"));
    }

    #[tokio::test]
    async fn test_write_actions_and_revert_restore_previous() {
        let store = make_store();
        store
            .seed("pokedex/1", json!({"name": "Bulbasaur", "base": {"HP": 45, "Attack": 49}}))
            .unwrap();
        let doc = path("pokedex/1");

        let payload = json!({"base": {"HP": 50}});
        let merged = store
            .merge(StoreRequest::new(&doc, &payload, &Value::Null))
            .await
            .unwrap();
        assert_eq!(merged, json!({"name": "Bulbasaur", "base": {"HP": 50, "Attack": 49}}));

        let props = json!(["base"]);
        let trimmed = store
            .delete_prop(StoreRequest::new(&doc, &props, &Value::Null))
            .await
            .unwrap();
        assert_eq!(trimmed, json!({"name": "Bulbasaur"}));

        store
            .revert(ActionName::DeleteProp, StoreRequest::new(&doc, &props, &Value::Null))
            .await
            .unwrap();
        assert_eq!(
            store.doc("pokedex/1"),
            Some(to_document(&json!({"name": "Bulbasaur", "base": {"HP": 50, "Attack": 49}})))
        );
    }

    #[tokio::test]
    async fn test_write_on_collection_is_rejected() {
        let store = make_store();
        let collection = path("pokedex");
        let payload = json!({"name": "Ditto"});
        let err = store
            .assign(StoreRequest::new(&collection, &payload, &Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPath);
    }

    #[tokio::test]
    async fn test_delete_ids_from_collection() {
        let store = make_store();
        store.seed("pokedex/1", json!({"name": "Bulbasaur"})).unwrap();
        store.seed("pokedex/4", json!({"name": "Charmander"})).unwrap();
        let collection = path("pokedex");
        let ids = json!(["1", "4"]);

        store
            .delete(StoreRequest::new(&collection, &ids, &Value::Null))
            .await
            .unwrap();
        assert!(store.is_empty());

        store
            .revert(ActionName::Delete, StoreRequest::new(&collection, &ids, &Value::Null))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_get_collection_and_cache_role() {
        let remote = make_store();
        remote.seed("pokedex/1", json!({"name": "Bulbasaur"})).unwrap();
        remote.seed("pokedex/1/moves/1", json!({"name": "Tackle"})).unwrap();
        remote.seed("trainers/1", json!({"name": "Ash"})).unwrap();
        let collection = path("pokedex");
        let sink = Collected::default();

        let response = remote
            .get(StoreRequest::new(&collection, &Value::Null, &Value::Null), &sink)
            .await
            .unwrap();
        match response {
            GetResponse::Docs(docs) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0].id, "1");
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let local = make_store().caching_reads();
        local.seed("pokedex/4", json!({"name": "Charmander"})).unwrap();
        let response = local
            .get(StoreRequest::new(&collection, &Value::Null, &Value::Null), &sink)
            .await
            .unwrap();
        assert_eq!(sink.added.lock().unwrap().len(), 1);

        let GetResponse::OnAdded(applier) = response else {
            panic!("cache role answers with an applier");
        };
        let metadata = DocMetadata::now("7");
        applier(to_document(&json!({"name": "Squirtle"})), &metadata);
        assert_eq!(local.doc("pokedex/7"), Some(to_document(&json!({"name": "Squirtle"}))));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = make_store();
        store.fail_on(ActionName::Merge);
        let doc = path("pokedex/1");
        let payload = json!({});

        let err = store
            .merge(StoreRequest::new(&doc, &payload, &Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::StoreActionFailed);

        store.recover(ActionName::Merge);
        assert!(store.merge(StoreRequest::new(&doc, &payload, &Value::Null)).await.is_ok());
    }

    #[tokio::test]
    async fn test_stream_emits_until_stopped() {
        let store = make_store().with_stream_script(vec![
            ScriptedEvent::added("1", json!({"name": "Bulbasaur"})),
            ScriptedEvent::removed("1"),
            ScriptedEvent::added("4", json!({"name": "Charmander"})),
            ScriptedEvent::added("7", json!({"name": "Squirtle"})),
        ]);
        let collection = path("pokedex");
        let sink = Arc::new(Collected::default());
        let mut table = NextStoresStream::new();

        let handle = store
            .stream(
                StoreRequest::new(&collection, &Value::Null, &Value::Null),
                StreamContext {
                    next_stores: &mut table,
                    incoming: sink.clone(),
                },
            )
            .await
            .unwrap()
            .expect("memory store keeps a stream open");
        assert_eq!(table.len(), 5);

        let streaming = tokio::spawn(handle.streaming);
        tokio::time::sleep(Duration::from_millis(40)).await;
        (handle.stop)();
        streaming.await.unwrap().unwrap();

        let added: Vec<String> =
            sink.added.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(added, vec!["1"]);
        assert_eq!(*sink.removed.lock().unwrap(), vec!["1"]);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sink.added.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_later_stream_notifies_earlier_store() {
        let local = make_store();
        let remote = make_store().with_stream_script(vec![ScriptedEvent::added(
            "25",
            json!({"name": "Pikachu"}),
        )]);
        let collection = path("pokedex");
        let sink = Arc::new(Collected::default());
        let mut table = NextStoresStream::new();

        for store in [&local, &remote] {
            let handle = store
                .stream(
                    StoreRequest::new(&collection, &Value::Null, &Value::Null),
                    StreamContext {
                        next_stores: &mut table,
                        incoming: sink.clone(),
                    },
                )
                .await
                .unwrap()
                .unwrap();
            let stop = handle.stop.clone();
            let task = tokio::spawn(handle.streaming);
            tokio::time::sleep(Duration::from_millis(30)).await;
            stop();
            task.await.unwrap().unwrap();
        }

        assert_eq!(local.doc("pokedex/25"), Some(to_document(&json!({"name": "Pikachu"}))));
    }
}
