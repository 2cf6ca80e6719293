use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::State;

/// Errors originating in the lifecycle framework.
#[derive(Clone, Debug, Error)]
pub enum ServiceError {
    /// Operation requires the service to be in a different state.
    #[error("invalid service state (expected {expected}, found {actual})")]
    InvalidState {
        /// State the operation needed.
        expected: State,
        /// State the service was actually in.
        actual: State,
    },

    /// Waited for the service to be running, but it moved past that.
    #[error("service not running (state {state})")]
    NotRunning {
        /// State the service was in when we gave up waiting.
        state: State,
        /// Failure case, if the service had failed.
        failure: Option<Arc<anyhow::Error>>,
    },

    /// Service ended up in `Failed`.
    #[error("service failed (from {from}): {failure}")]
    Failed {
        /// State the service was in when it failed.
        from: State,
        /// Error returned by the hook that failed it.
        failure: Arc<anyhow::Error>,
    },

    /// Timer interval was zero.
    #[error("timer interval must be positive (got {0:?})")]
    InvalidInterval(Duration),

    /// A hook panicked instead of returning.
    #[error("panic in service hook (info: {0})")]
    HookPanic(String),

    /// Tried to start a service outside of a tokio runtime.
    #[error("no tokio runtime to launch service on")]
    NoRuntime,

    /// Lifecycle task went away without publishing a terminal state.
    #[error("service lifecycle task exited")]
    LifecycleExited,
}

impl ServiceError {
    /// Returns the hook error behind this error, if it is one.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        match self {
            Self::NotRunning { failure, .. } => failure.as_deref(),
            Self::Failed { failure, .. } => Some(&**failure),
            _ => None,
        }
    }
}
