//! Hook dispatcher: runs one phase's hooks in registration order.
//!
//! - Each hook is awaited before the next one starts.
//! - A failing hook stops the phase; the failure is reported as
//!   `HookFailed` unless the hook already used that kind.
//! - Aborting does not stop the phase: every hook of the phase still runs,
//!   and the caller inspects the abort signal afterwards.

use std::sync::Arc;

use tracing::{debug, warn};

use tandem_core::error::{AppError, ErrorKind};
use tandem_core::result::AppResult;

use super::definitions::{ActionHook, HookEvent};

/// Runs every hook in `hooks` sequentially with the same event.
pub async fn run_phase(hooks: &[Arc<dyn ActionHook>], event: &HookEvent<'_>) -> AppResult<()> {
    if hooks.is_empty() {
        return Ok(());
    }

    debug!(
        phase = %event.phase,
        action = %event.action,
        store = %event.store,
        hook_count = hooks.len(),
        "Dispatching hooks"
    );

    for (index, hook) in hooks.iter().enumerate() {
        if let Err(err) = hook.handle(event).await {
            warn!(
                phase = %event.phase,
                action = %event.action,
                store = %event.store,
                index,
                error = %err,
                "Hook failed"
            );
            return Err(into_hook_error(err, event));
        }
    }

    Ok(())
}

fn into_hook_error(err: AppError, event: &HookEvent<'_>) -> AppError {
    if err.kind == ErrorKind::HookFailed {
        return err;
    }
    let message = format!(
        "{} hook for store '{}' failed during '{}': {}",
        event.phase, event.store, event.action, err.message
    );
    AppError::with_source(ErrorKind::HookFailed, message, err)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tandem_core::types::{ActionName, ModulePath};

    use super::*;
    use crate::definitions::{AbortSignal, HookPhase, hook_fn, try_hook_fn};

    #[tokio::test]
    async fn test_all_hooks_run_even_after_abort() {
        let ran = Arc::new(Mutex::new(0));
        let first = {
            let ran = ran.clone();
            hook_fn(move |event| {
                *ran.lock().unwrap() += 1;
                event.abort();
            })
        };
        let second = {
            let ran = ran.clone();
            hook_fn(move |_| *ran.lock().unwrap() += 1)
        };

        let signal = AbortSignal::new();
        let path = ModulePath::parse("pokedex/7").unwrap();
        let payload = json!({"name": "Squirtle"});
        let event = HookEvent::new(
            HookPhase::Before,
            ActionName::Merge,
            "local",
            &path,
            &payload,
            Some(&signal),
        );

        run_phase(&[first, second], &event).await.unwrap();
        assert_eq!(*ran.lock().unwrap(), 2);
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_failure_stops_phase() {
        let ran = Arc::new(Mutex::new(0));
        let failing = try_hook_fn(|_| Err(AppError::validation("name is required")));
        let after = {
            let ran = ran.clone();
            hook_fn(move |_| *ran.lock().unwrap() += 1)
        };

        let path = ModulePath::parse("pokedex").unwrap();
        let payload = json!({});
        let event = HookEvent::new(
            HookPhase::Before,
            ActionName::Insert,
            "remote",
            &path,
            &payload,
            None,
        );

        let err = run_phase(&[failing, after], &event).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::HookFailed);
        assert!(err.message.contains("name is required"));
        assert_eq!(*ran.lock().unwrap(), 0);
    }
}
