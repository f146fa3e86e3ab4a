//! Hook phases, the event passed to hooks, and the abort capability.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::types::{ActionName, ActionOutput, ModulePath};

/// The points of a store's turn at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Before the store action is invoked. Can abort.
    Before,
    /// After the store action succeeded. Can abort further stores.
    Success,
    /// After the store action failed. Can abort.
    Error,
    /// After the store compensated a previously applied action.
    Revert,
}

impl HookPhase {
    /// Every phase, in pipeline order.
    pub const ALL: [HookPhase; 4] = [Self::Before, Self::Success, Self::Error, Self::Revert];

    /// Returns the string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Success => "success",
            Self::Error => "error",
            Self::Revert => "revert",
        }
    }

    /// Returns whether hooks in this phase may call `abort()`.
    pub fn can_abort(&self) -> bool {
        !matches!(self, Self::Revert)
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Call-scoped abort flag for one store's turn.
#[derive(Debug, Default)]
pub struct AbortSignal {
    aborted: AtomicBool,
}

impl AbortSignal {
    /// Creates a signal that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Returns whether the signal was raised.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Everything a hook gets to see.
#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    /// The phase being fired.
    pub phase: HookPhase,
    /// The action being executed.
    pub action: ActionName,
    /// The store whose turn this is.
    pub store: &'a str,
    /// The module path the store acts on.
    pub path: &'a ModulePath,
    /// The payload handed to the store.
    pub payload: &'a Value,
    /// The store's result (`success` only; `None` if the error was swallowed).
    pub result: Option<&'a ActionOutput>,
    /// The store's error (`error` only).
    pub error: Option<&'a AppError>,
    abort: Option<&'a AbortSignal>,
}

impl<'a> HookEvent<'a> {
    /// Creates an event for `phase`. `abort` is ignored for phases that
    /// cannot abort.
    pub fn new(
        phase: HookPhase,
        action: ActionName,
        store: &'a str,
        path: &'a ModulePath,
        payload: &'a Value,
        abort: Option<&'a AbortSignal>,
    ) -> Self {
        Self {
            phase,
            action,
            store,
            path,
            payload,
            result: None,
            error: None,
            abort: abort.filter(|_| phase.can_abort()),
        }
    }

    /// Attaches the store's result.
    pub fn with_result(mut self, result: Option<&'a ActionOutput>) -> Self {
        self.result = result;
        self
    }

    /// Attaches the store's error.
    pub fn with_error(mut self, error: &'a AppError) -> Self {
        self.error = Some(error);
        self
    }

    /// Prevents any further store from running for this call. In `before`
    /// it also prevents this store's action.
    pub fn abort(&self) {
        if let Some(signal) = self.abort {
            signal.abort();
        }
    }
}

/// Trait for hook implementations.
#[async_trait]
pub trait ActionHook: Send + Sync + fmt::Debug {
    /// Handles a hook invocation.
    async fn handle(&self, event: &HookEvent<'_>) -> AppResult<()>;
}

/// A hook backed by a plain closure.
pub struct FnHook<F> {
    f: F,
}

impl<F> fmt::Debug for FnHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHook").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> ActionHook for FnHook<F>
where
    F: Fn(&HookEvent<'_>) -> AppResult<()> + Send + Sync,
{
    async fn handle(&self, event: &HookEvent<'_>) -> AppResult<()> {
        (self.f)(event)
    }
}

/// Wraps an infallible closure as a hook.
pub fn hook_fn<F>(f: F) -> Arc<dyn ActionHook>
where
    F: Fn(&HookEvent<'_>) + Send + Sync + 'static,
{
    Arc::new(FnHook {
        f: move |event: &HookEvent<'_>| {
            f(event);
            Ok(())
        },
    })
}

/// Wraps a fallible closure as a hook.
pub fn try_hook_fn<F>(f: F) -> Arc<dyn ActionHook>
where
    F: Fn(&HookEvent<'_>) -> AppResult<()> + Send + Sync + 'static,
{
    Arc::new(FnHook { f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_abort_raises_signal() {
        let signal = AbortSignal::new();
        let path = ModulePath::parse("pokedex").expect("valid");
        let payload = json!({});
        let event = HookEvent::new(
            HookPhase::Before,
            ActionName::Insert,
            "local",
            &path,
            &payload,
            Some(&signal),
        );
        assert!(!signal.is_aborted());
        event.abort();
        assert!(signal.is_aborted());
    }

    #[test]
    fn test_revert_event_cannot_abort() {
        let signal = AbortSignal::new();
        let path = ModulePath::parse("pokedex").expect("valid");
        let payload = json!({});
        let event = HookEvent::new(
            HookPhase::Revert,
            ActionName::Insert,
            "local",
            &path,
            &payload,
            Some(&signal),
        );
        event.abort();
        assert!(!signal.is_aborted());
    }
}
