//! Action Executor: one store's turn for one non-streaming action.
//!
//! A turn runs `before` hooks, the store action, then `success` or `error`
//! hooks. The executor never decides about other stores directly: it asks
//! the dispatcher to stop through [`ExecutionControl`].

use std::future::Future;

use serde_json::Value;
use tracing::{debug, error, warn};

use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::types::{ActionName, ActionOutput, ModulePath, OnErrorPolicy};
use tandem_hooks::{AbortSignal, HookEvent, HookMap, HookPhase, run_phase};

use crate::control::{ExecutionControl, StopExecution};

/// Inputs of one store's turn.
#[derive(Debug, Clone, Copy)]
pub struct StoreTurn<'a> {
    /// Store name.
    pub store: &'a str,
    /// Action being run.
    pub action: ActionName,
    /// Path the store acts on.
    pub path: &'a ModulePath,
    /// Transformed payload.
    pub payload: &'a Value,
    /// The store's merged hook map.
    pub hooks: &'a HookMap,
    /// Effective error policy.
    pub on_error: OnErrorPolicy,
    /// Stop capability of the current call.
    pub control: &'a ExecutionControl,
}

/// How a turn ended, when it did not end the call with an error.
#[derive(Debug)]
pub enum TurnOutcome {
    /// A `before` hook aborted; the store action never ran.
    AbortedBeforeAction,
    /// The store does not implement the action.
    Skipped,
    /// The store action succeeded.
    Completed(ActionOutput),
    /// The store action failed and the `continue` policy swallowed it.
    Recovered(AppError),
    /// The store action failed under the `revert` policy. The dispatcher
    /// compensates and then surfaces this error.
    Failed(AppError),
}

impl TurnOutcome {
    /// Returns `true` if the store applied the action.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Runs one store's turn.
///
/// `invoke` is `None` when the store does not implement the action; the
/// `before` hooks still run. Errors returned from here end the call: the
/// store's own error under the `stop` policy (or after an abort in `error`
/// hooks), or a failing hook.
pub async fn execute_turn<F>(turn: StoreTurn<'_>, invoke: Option<F>) -> AppResult<TurnOutcome>
where
    F: Future<Output = AppResult<ActionOutput>>,
{
    let signal = AbortSignal::new();
    let event = |phase: HookPhase| {
        HookEvent::new(
            phase,
            turn.action,
            turn.store,
            turn.path,
            turn.payload,
            Some(&signal),
        )
    };

    run_phase(&turn.hooks.before, &event(HookPhase::Before)).await?;

    if signal.is_aborted() {
        debug!(store = %turn.store, action = %turn.action, "Aborted before action");
        turn.control.stop_after_action(StopExecution::Stop);
        return Ok(TurnOutcome::AbortedBeforeAction);
    }

    let Some(invoke) = invoke else {
        debug!(
            store = %turn.store,
            action = %turn.action,
            "Store does not implement action, skipping"
        );
        return Ok(TurnOutcome::Skipped);
    };

    debug!(store = %turn.store, action = %turn.action, path = %turn.path, "Invoking store action");

    match invoke.await {
        Ok(output) => {
            finish(turn, &signal, Some(&output)).await?;
            Ok(TurnOutcome::Completed(output))
        }
        Err(err) => {
            run_phase(&turn.hooks.error, &event(HookPhase::Error).with_error(&err)).await?;

            if signal.is_aborted() || turn.on_error == OnErrorPolicy::Stop {
                error!(
                    store = %turn.store,
                    action = %turn.action,
                    aborted = signal.is_aborted(),
                    error = %err,
                    "Store action failed, stopping"
                );
                turn.control.stop_after_action(StopExecution::Stop);
                return Err(err);
            }

            if turn.on_error == OnErrorPolicy::Revert {
                warn!(
                    store = %turn.store,
                    action = %turn.action,
                    error = %err,
                    "Store action failed, reverting"
                );
                turn.control.stop_after_action(StopExecution::Revert);
                return Ok(TurnOutcome::Failed(err));
            }

            warn!(
                store = %turn.store,
                action = %turn.action,
                error = %err,
                "Store action failed, continuing"
            );
            finish(turn, &signal, None).await?;
            Ok(TurnOutcome::Recovered(err))
        }
    }
}

async fn finish(
    turn: StoreTurn<'_>,
    signal: &AbortSignal,
    output: Option<&ActionOutput>,
) -> AppResult<()> {
    let event = HookEvent::new(
        HookPhase::Success,
        turn.action,
        turn.store,
        turn.path,
        turn.payload,
        Some(signal),
    )
    .with_result(output);
    run_phase(&turn.hooks.success, &event).await?;

    if signal.is_aborted() {
        debug!(store = %turn.store, action = %turn.action, "Aborted after action");
        turn.control.stop_after_action(StopExecution::Stop);
    }
    Ok(())
}
