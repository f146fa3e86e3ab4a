//! Call-scoped stop state shared between the dispatcher and the executor.

use std::sync::atomic::{AtomicU8, Ordering};

/// Whether the dispatcher may give the next store a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopExecution {
    /// Keep going.
    No,
    /// Do not run further stores.
    Stop,
    /// Do not run further stores; compensate the ones that completed.
    Revert,
}

impl StopExecution {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Stop,
            2 => Self::Revert,
            _ => Self::No,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::No => 0,
            Self::Stop => 1,
            Self::Revert => 2,
        }
    }
}

/// The stop capability handed to each store turn of one call.
#[derive(Debug)]
pub struct ExecutionControl {
    state: AtomicU8,
}

impl ExecutionControl {
    /// Creates a control in the `No` state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(StopExecution::No.as_u8()),
        }
    }

    /// Stops the loop after the current store's turn.
    pub fn stop_after_action(&self, flag: StopExecution) {
        self.state.store(flag.as_u8(), Ordering::SeqCst);
    }

    /// The current state.
    pub fn state(&self) -> StopExecution {
        StopExecution::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns `true` once any stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.state() != StopExecution::No
    }
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new()
    }
}
