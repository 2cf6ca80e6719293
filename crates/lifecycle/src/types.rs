//! Core lifecycle types.

use std::fmt;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::ServiceContext;

/// Lifecycle state of a service.
///
/// States are ordered by progression.  `Terminated` and `Failed` are both
/// terminal, once a service reaches one of them it never leaves it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum State {
    /// Constructed but not yet started.
    New,

    /// Starting hook is running.
    Starting,

    /// Running hook is running.
    Running,

    /// Stopping hook is running.
    Stopping,

    /// Stopped cleanly.
    Terminated,

    /// Stopped because one of the hooks returned an error.
    Failed,
}

impl State {
    /// Returns if no further transitions can happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    /// Returns if the lifecycle permits moving from this state to `to`.
    pub fn can_transition_to(&self, to: State) -> bool {
        use State::*;
        matches!(
            (*self, to),
            (New, Starting)
                | (New, Terminated)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Terminated)
                | (Stopping, Failed)
        )
    }

    /// Returns the name of the state, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Terminated => "Terminated",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Future returned by every lifecycle hook.
pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Invoked once when the service leaves `New`.  An error here fails the
/// service without ever entering `Running`.
pub type StartingFn = Box<dyn FnOnce(ServiceContext) -> HookFuture + Send + 'static>;

/// Body of the service, executed while `Running`.
///
/// Must return promptly once the context is cancelled.  Returning an error
/// fails the service.
pub type RunningFn = Box<dyn FnOnce(ServiceContext) -> HookFuture + Send + 'static>;

/// Invoked once when the service enters `Stopping`, for whatever reason.
///
/// The context carries the failure case that caused the stop, if any.
pub type StoppingFn = Box<dyn FnOnce(ServiceContext) -> HookFuture + Send + 'static>;

/// One iteration of a timer service.  An error fails the service.
pub type OneIteration = Box<dyn FnMut(ServiceContext) -> HookFuture + Send + 'static>;

/// Boxes a closure returning a future into a [`StartingFn`], [`RunningFn`]
/// or [`StoppingFn`].
pub fn hook<F, Fut>(f: F) -> Box<dyn FnOnce(ServiceContext) -> HookFuture + Send + 'static>
where
    F: FnOnce(ServiceContext) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |ctx: ServiceContext| -> HookFuture { Box::pin(f(ctx)) })
}

/// Boxes a closure returning a future into a [`OneIteration`].
pub fn iteration<F, Fut>(mut f: F) -> OneIteration
where
    F: FnMut(ServiceContext) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |ctx: ServiceContext| -> HookFuture { Box::pin(f(ctx)) })
}

/// Hook that does nothing and succeeds.
pub(crate) fn noop_hook() -> Box<dyn FnOnce(ServiceContext) -> HookFuture + Send + 'static> {
    hook(|_| async { Ok(()) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_order() {
        assert!(State::New < State::Starting);
        assert!(State::Starting < State::Running);
        assert!(State::Running < State::Stopping);
        assert!(State::Stopping < State::Terminated);
        assert!(State::Terminated < State::Failed);
    }

    #[test]
    fn test_state_terminal() {
        let terminal = [State::Terminated, State::Failed];
        let live = [State::New, State::Starting, State::Running, State::Stopping];

        assert!(terminal.iter().all(State::is_terminal));
        assert!(!live.iter().any(State::is_terminal));
    }

    #[test]
    fn test_transitions() {
        assert!(State::New.can_transition_to(State::Starting));
        assert!(State::New.can_transition_to(State::Terminated));
        assert!(State::Running.can_transition_to(State::Failed));
        assert!(!State::New.can_transition_to(State::Running));
        assert!(!State::Running.can_transition_to(State::Starting));

        let all = [
            State::New,
            State::Starting,
            State::Running,
            State::Stopping,
            State::Terminated,
            State::Failed,
        ];
        for from in [State::Terminated, State::Failed] {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_state_json() {
        let j = serde_json::to_value(State::Stopping).expect("test: serialize state");
        assert_eq!(j, serde_json::json!("Stopping"));
        assert_eq!(State::Failed.to_string(), "Failed");
    }
}
