//! Stream Dispatcher: opens one subscription per store and combines them
//! into a single cancellable stream request.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use tandem_core::result::AppResult;
use tandem_core::traits::store::{StoreRequest, StreamContext};
use tandem_core::types::{ActionName, ModulePath, NextStoresStream, StopFn, StoreStream};
use tandem_hooks::{AbortSignal, HookEvent, HookPhase, run_phase};

use crate::config::{ActionConfig, GlobalConfig, ModuleConfig, resolve_action};
use crate::data::{DataContainer, IncomingPipeline};
use crate::open_streams::{OpenStreams, StreamKey, StreamSubscription};
use crate::registry::StoreRegistry;
use crate::transform::apply_payload_chain;

/// Dispatches `stream` requests for one module.
#[derive(Debug, Clone, Copy)]
pub struct StreamDispatcher<'a> {
    registry: &'a StoreRegistry,
    global: &'a GlobalConfig,
    module: &'a ModuleConfig,
    container: &'a Arc<DataContainer>,
    open_streams: &'a Arc<OpenStreams>,
}

impl<'a> StreamDispatcher<'a> {
    /// Creates a stream dispatcher for the module configured by `module`.
    pub fn new(
        registry: &'a StoreRegistry,
        global: &'a GlobalConfig,
        module: &'a ModuleConfig,
        container: &'a Arc<DataContainer>,
        open_streams: &'a Arc<OpenStreams>,
    ) -> Self {
        Self {
            registry,
            global,
            module,
            container,
            open_streams,
        }
    }

    /// Opens the stores' streams in execution order and registers the
    /// combined request in the open-streams registry.
    ///
    /// A store failing to open its stream stops the streams opened before it
    /// and fails the request.
    pub async fn open(
        &self,
        path: &ModulePath,
        payload: Value,
        call: &ActionConfig,
    ) -> AppResult<StreamSubscription> {
        let action = ActionName::Stream;
        let resolved = resolve_action(action, self.registry, self.global, self.module, call)?;
        let key = call
            .stream_key
            .clone()
            .unwrap_or_else(|| StreamKey::from_payload(&payload));
        let payload = apply_payload_chain(&resolved.payload_chain, payload);
        let incoming = Arc::new(IncomingPipeline::new(
            self.container.clone(),
            resolved.read_chain,
        ));
        let mut next_stores = NextStoresStream::new();
        let mut opened: Vec<(&str, StoreStream)> = Vec::new();

        for store_name in &resolved.execution_order {
            let store = self.registry.get(store_name)?;
            if !store.implements(action) {
                debug!(store = %store_name, "Store does not stream, skipping");
                continue;
            }

            let hooks = resolved.hooks.for_store(store_name);
            let signal = AbortSignal::new();
            let event = |phase: HookPhase| {
                HookEvent::new(phase, action, store_name, path, &payload, Some(&signal))
            };

            if let Err(err) = run_phase(&hooks.before, &event(HookPhase::Before)).await {
                stop_opened(&opened);
                return Err(err);
            }
            if signal.is_aborted() {
                info!(
                    store = %store_name,
                    key = %key,
                    "Stream aborted before opening, skipping remaining stores"
                );
                break;
            }

            let request = StoreRequest::new(path, &payload, self.module.store_config(store_name));
            let context = StreamContext {
                next_stores: &mut next_stores,
                incoming: incoming.clone(),
            };

            match store.stream(request, context).await {
                Ok(handle) => {
                    if let Some(handle) = handle {
                        opened.push((store_name.as_str(), handle));
                    }
                    if let Err(err) = run_phase(&hooks.success, &event(HookPhase::Success)).await {
                        stop_opened(&opened);
                        return Err(err);
                    }
                    if signal.is_aborted() {
                        info!(
                            store = %store_name,
                            key = %key,
                            "Stream aborted after opening, skipping remaining stores"
                        );
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        store = %store_name,
                        key = %key,
                        error = %err,
                        "Store failed to open stream"
                    );
                    let hooked =
                        run_phase(&hooks.error, &event(HookPhase::Error).with_error(&err)).await;
                    stop_opened(&opened);
                    return Err(hooked.err().unwrap_or(err));
                }
            }
        }

        let stops: Vec<StopFn> = opened.iter().map(|(_, handle)| handle.stop.clone()).collect();
        let streams: Vec<_> = opened
            .into_iter()
            .map(|(store, handle)| {
                let store = store.to_string();
                handle.streaming.map(move |result| {
                    if let Err(err) = &result {
                        warn!(store = %store, error = %err, "Store stream failed");
                    }
                    result
                })
            })
            .collect();

        let generation = self.open_streams.register(key.clone(), stops.clone());
        let open_streams = self.open_streams.clone();
        let release_key = key.clone();

        let task = tokio::spawn(async move {
            let result = try_join_all(streams).await;
            if result.is_err() {
                stops.iter().for_each(|stop| stop());
            }
            open_streams.release(&release_key, generation);
            result.map(|_| ())
        });
        info!(key = %key, "Stream request opened");

        Ok(StreamSubscription::new(key, task))
    }
}

fn stop_opened(opened: &[(&str, StoreStream)]) {
    for (store, handle) in opened {
        debug!(store = %store, "Stopping stream opened before the failure");
        (handle.stop)();
    }
}
