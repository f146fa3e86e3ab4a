//! Action Dispatcher: drives one non-streaming action through every store
//! of the execution order.
//!
//! Owns the call's stop state and the compensation pass. Each store's turn
//! is delegated to [`execute_turn`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use tandem_core::error::{AppError, ErrorKind};
use tandem_core::result::AppResult;
use tandem_core::traits::store::{IncomingDocs, StoreCapability, StoreRequest};
use tandem_core::types::{ActionName, ActionOutput, GetResponse, ModulePath};
use tandem_hooks::{HookEvent, HookPhase, ResolvedHooks, run_phase};

use crate::config::{ActionConfig, GlobalConfig, ModuleConfig, resolve_action};
use crate::control::{ExecutionControl, StopExecution};
use crate::data::{DataContainer, IncomingPipeline};
use crate::executor::{StoreTurn, TurnOutcome, execute_turn};
use crate::registry::StoreRegistry;
use crate::transform::apply_payload_chain;

/// A store that applied the action, with the path it was called with.
struct CompletedTurn<'a> {
    store: &'a str,
    path: ModulePath,
}

/// Dispatches actions for one module.
#[derive(Debug, Clone, Copy)]
pub struct ActionDispatcher<'a> {
    registry: &'a StoreRegistry,
    global: &'a GlobalConfig,
    module: &'a ModuleConfig,
    container: &'a Arc<DataContainer>,
}

impl<'a> ActionDispatcher<'a> {
    /// Creates a dispatcher for the module configured by `module`.
    pub fn new(
        registry: &'a StoreRegistry,
        global: &'a GlobalConfig,
        module: &'a ModuleConfig,
        container: &'a Arc<DataContainer>,
    ) -> Self {
        Self {
            registry,
            global,
            module,
            container,
        }
    }

    /// Runs `action` on `path` and returns the path of the module the caller
    /// should get back: the document for document modules and inserts, the
    /// collection otherwise.
    pub async fn dispatch(
        &self,
        action: ActionName,
        path: &ModulePath,
        payload: Value,
        call: &ActionConfig,
    ) -> AppResult<ModulePath> {
        if action == ActionName::Stream {
            return Err(AppError::validation(
                "'stream' is dispatched by the stream dispatcher",
            ));
        }

        let resolved = resolve_action(action, self.registry, self.global, self.module, call)?;
        let payload = apply_payload_chain(&resolved.payload_chain, payload);
        let control = ExecutionControl::new();
        let mut pipeline = IncomingPipeline::new(self.container.clone(), resolved.read_chain);
        let mut target = path.clone();
        let mut completed: Vec<CompletedTurn<'_>> = Vec::new();

        debug!(
            action = %action,
            path = %path,
            stores = ?resolved.execution_order,
            "Dispatching action"
        );

        for store_name in &resolved.execution_order {
            if control.is_stopped() {
                debug!(
                    action = %action,
                    next_store = %store_name,
                    "Execution stopped, skipping remaining stores"
                );
                break;
            }

            let store = self.registry.get(store_name)?;
            let request =
                StoreRequest::new(&target, &payload, self.module.store_config(store_name));
            let turn = StoreTurn {
                store: store_name,
                action,
                path: &target,
                payload: &payload,
                hooks: resolved.hooks.for_store(store_name),
                on_error: resolved.on_error,
                control: &control,
            };

            let invoke = store
                .implements(action)
                .then(|| invoke_action(store.as_ref(), action, request, &pipeline));
            let outcome = execute_turn(turn, invoke).await?;

            if control.state() == StopExecution::Revert {
                let original = match outcome {
                    TurnOutcome::Failed(err) => err,
                    _ => AppError::internal(format!(
                        "Store '{store_name}' requested a revert without failing"
                    )),
                };
                self.revert(action, &payload, &resolved.hooks, &completed)
                    .await?;
                return Err(original);
            }

            let TurnOutcome::Completed(output) = outcome else {
                continue;
            };

            completed.push(CompletedTurn {
                store: store_name,
                path: target.clone(),
            });

            if let Some(id) = output.inserted_id().filter(|_| target.is_collection()) {
                target = target.child(id)?;
                debug!(
                    store = %store_name,
                    path = %target,
                    "Insert generated id, addressing document"
                );
            }

            match output {
                ActionOutput::Get(GetResponse::OnAdded(applier)) => {
                    pipeline.push_added(applier);
                }
                ActionOutput::Get(GetResponse::Docs(docs)) => {
                    for doc in docs {
                        pipeline.added(doc);
                    }
                }
                _ => {}
            }
        }

        if path.is_doc() || action == ActionName::Insert {
            Ok(target)
        } else {
            Ok(path.clone())
        }
    }

    async fn revert(
        &self,
        action: ActionName,
        payload: &Value,
        hooks: &ResolvedHooks,
        completed: &[CompletedTurn<'_>],
    ) -> AppResult<()> {
        info!(action = %action, store_count = completed.len(), "Reverting completed stores");

        for turn in completed.iter().rev() {
            let store = self.registry.get(turn.store)?;
            let request =
                StoreRequest::new(&turn.path, payload, self.module.store_config(turn.store));

            store.revert(action, request).await.map_err(|err| {
                warn!(store = %turn.store, action = %action, error = %err, "Revert failed");
                let message = format!(
                    "Revert of '{action}' failed for store '{}': {}",
                    turn.store, err.message
                );
                AppError::with_source(ErrorKind::RevertFailed, message, err)
            })?;

            let event = HookEvent::new(
                HookPhase::Revert,
                action,
                turn.store,
                &turn.path,
                payload,
                None,
            );
            run_phase(&hooks.for_store(turn.store).revert, &event).await?;
            debug!(store = %turn.store, action = %action, "Store reverted");
        }
        Ok(())
    }
}

async fn invoke_action(
    store: &dyn StoreCapability,
    action: ActionName,
    request: StoreRequest<'_>,
    incoming: &IncomingPipeline,
) -> AppResult<ActionOutput> {
    match action {
        ActionName::Get => store
            .get(request, incoming as &dyn IncomingDocs)
            .await
            .map(ActionOutput::Get),
        ActionName::Insert => {
            let id = store.insert(request).await?;
            if let Some(id) = id.as_deref().filter(|id| !id.is_empty()) {
                if request.path.is_collection() {
                    request.path.child(id).map_err(|err| {
                        AppError::store_action_failed(format!(
                            "Store generated an unusable document id: {}",
                            err.message
                        ))
                    })?;
                }
            }
            Ok(ActionOutput::Inserted(id))
        }
        ActionName::Merge => store.merge(request).await.map(ActionOutput::Written),
        ActionName::Assign => store.assign(request).await.map(ActionOutput::Written),
        ActionName::Replace => store.replace(request).await.map(ActionOutput::Written),
        ActionName::DeleteProp => store.delete_prop(request).await.map(ActionOutput::Written),
        ActionName::Delete => store.delete(request).await.map(|()| ActionOutput::Deleted),
        ActionName::Stream => Err(AppError::validation(
            "'stream' is dispatched by the stream dispatcher",
        )),
    }
}
