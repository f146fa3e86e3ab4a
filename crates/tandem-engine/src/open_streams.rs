//! Open-Streams Registry: stop functions of live stream requests, keyed by
//! stream key.
//!
//! Process-wide: every module of an orchestrator shares one registry. A key
//! registered twice keeps only the latest registration; callers must not
//! race identical stream requests.

use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::types::StopFn;

/// Identity of one stream request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey(String);

impl StreamKey {
    /// A caller-chosen key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The canonical JSON serialization of `payload`, object keys sorted at
    /// every level.
    pub fn from_payload(payload: &Value) -> Self {
        Self(canonical(payload).to_string())
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

struct Registration {
    generation: u64,
    stops: Vec<StopFn>,
}

/// Registry of live stream requests.
#[derive(Default)]
pub struct OpenStreams {
    entries: DashMap<StreamKey, Registration>,
    next_generation: AtomicU64,
    stop_replaced: bool,
}

impl OpenStreams {
    /// Creates an empty registry.
    pub fn new(stop_replaced: bool) -> Self {
        Self {
            stop_replaced,
            ..Self::default()
        }
    }

    /// Registers the stop functions of one stream request and returns the
    /// registration's generation.
    pub fn register(&self, key: StreamKey, stops: Vec<StopFn>) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let store_count = stops.len();
        let replaced = self
            .entries
            .insert(key.clone(), Registration { generation, stops });

        if let Some(previous) = replaced {
            warn!(
                key = %key,
                stop_replaced = self.stop_replaced,
                "Stream key registered again, latest registration wins"
            );
            if self.stop_replaced {
                previous.stops.iter().for_each(|stop| stop());
            }
        }

        info!(key = %key, store_count, generation, "Stream opened");
        generation
    }

    /// Stops every store stream registered under `key` and removes the entry.
    /// Returns `false` if nothing was registered.
    pub fn stop(&self, key: &StreamKey) -> bool {
        match self.entries.remove(key) {
            Some((_, registration)) => {
                registration.stops.iter().for_each(|stop| stop());
                info!(key = %key, store_count = registration.stops.len(), "Stream stopped");
                true
            }
            None => {
                debug!(key = %key, "No open stream for key");
                false
            }
        }
    }

    /// [`OpenStreams::stop`] for the key derived from `payload`.
    pub fn stop_payload(&self, payload: &Value) -> bool {
        self.stop(&StreamKey::from_payload(payload))
    }

    /// Stops every open stream. Returns how many requests were stopped.
    pub fn stop_all(&self) -> usize {
        let keys: Vec<StreamKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.iter().filter(|key| self.stop(key)).count()
    }

    /// Drops the entry for `key` if it still belongs to `generation`.
    pub(crate) fn release(&self, key: &StreamKey, generation: u64) {
        if self
            .entries
            .remove_if(key, |_, registration| registration.generation == generation)
            .is_some()
        {
            debug!(key = %key, generation, "Stream ended, registration released");
        }
    }

    /// Whether a stream is registered under `key`.
    pub fn contains(&self, key: &StreamKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys of every open stream, sorted.
    pub fn keys(&self) -> Vec<StreamKey> {
        let mut keys: Vec<StreamKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of open stream requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no stream is open.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for OpenStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenStreams")
            .field("open", &self.entries.len())
            .field("stop_replaced", &self.stop_replaced)
            .finish()
    }
}

/// The handle returned by a stream request.
///
/// The store streams run on a spawned task from the moment the request is
/// opened, whether or not the handle is awaited. Awaiting it resolves once
/// every store stream of the request has ended (normally after a stop), or
/// fails on the first store stream failure. Dropping it leaves the streams
/// running until they are stopped through the registry.
pub struct StreamSubscription {
    key: StreamKey,
    task: JoinHandle<AppResult<()>>,
}

impl StreamSubscription {
    pub(crate) fn new(key: StreamKey, task: JoinHandle<AppResult<()>>) -> Self {
        Self { key, task }
    }

    /// The key the request is registered under.
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Returns `true` once every store stream of the request has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the combined stream to end.
    pub async fn wait(self) -> AppResult<()> {
        let key = self.key;
        self.task.await.map_err(|e| {
            AppError::internal(format!("Stream task for '{key}' did not complete: {e}"))
        })?
    }
}

impl IntoFuture for StreamSubscription {
    type Output = AppResult<()>;
    type IntoFuture = BoxFuture<'static, AppResult<()>>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

impl fmt::Debug for StreamSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn counting_stop(counter: &Arc<AtomicUsize>) -> StopFn {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_key_ignores_object_key_order() {
        let a = StreamKey::from_payload(
            &json!({"type": "water", "gen": 1, "nested": {"b": 1, "a": 2}}),
        );
        let b = StreamKey::from_payload(
            &json!({"nested": {"a": 2, "b": 1}, "gen": 1, "type": "water"}),
        );
        assert_eq!(a, b);
        assert_ne!(a, StreamKey::from_payload(&json!({"type": "fire"})));
        assert_eq!(StreamKey::from_payload(&Value::Null).as_str(), "null");
    }

    #[test]
    fn test_stop_runs_every_store_stop_once() {
        let streams = OpenStreams::default();
        let stopped = Arc::new(AtomicUsize::new(0));
        let key = StreamKey::from_payload(&json!({}));
        streams.register(key.clone(), vec![counting_stop(&stopped), counting_stop(&stopped)]);

        assert!(streams.contains(&key));
        assert!(streams.stop_payload(&json!({})));
        assert_eq!(stopped.load(Ordering::SeqCst), 2);
        assert!(!streams.stop(&key));
        assert!(streams.is_empty());
    }

    #[test]
    fn test_latest_registration_wins() {
        let streams = OpenStreams::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let key = StreamKey::new("pokedex");

        let old = streams.register(key.clone(), vec![counting_stop(&first)]);
        streams.register(key.clone(), vec![counting_stop(&second)]);

        streams.release(&key, old);
        assert!(streams.contains(&key));

        streams.stop(&key);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_replaced_setting() {
        let streams = OpenStreams::new(true);
        let first = Arc::new(AtomicUsize::new(0));
        let key = StreamKey::new("pokedex");
        streams.register(key.clone(), vec![counting_stop(&first)]);
        streams.register(key, Vec::new());
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_all() {
        let streams = OpenStreams::default();
        streams.register(StreamKey::new("a"), Vec::new());
        streams.register(StreamKey::new("b"), Vec::new());
        assert_eq!(streams.keys(), vec![StreamKey::new("a"), StreamKey::new("b")]);
        assert_eq!(streams.stop_all(), 2);
        assert!(streams.is_empty());
    }
}
