//! Lifecycle listeners.

use std::fmt;

use crate::State;

/// Passive observer of a service's state transitions.
///
/// A listener has no control over the service.  Each method is called at most
/// once per service, in transition order, and calls to the same listener never
/// overlap.
pub trait Listener: Sync + Send + 'static {
    /// Service left `New` and is running its starting hook.
    fn starting(&self);

    /// Service finished starting and is now `Running`.
    fn running(&self);

    /// Service entered `Stopping` from `from`.
    fn stopping(&self, from: State);

    /// Service reached `Terminated` from `from`.
    fn terminated(&self, from: State);

    /// Service reached `Failed` from `from`, because of `failure`.
    fn failed(&self, from: State, failure: &anyhow::Error);
}

/// Callback for `starting` and `running`.
pub type NotifyFn = Box<dyn Fn() + Sync + Send + 'static>;

/// Callback for `stopping` and `terminated`.
pub type FromFn = Box<dyn Fn(State) + Sync + Send + 'static>;

/// Callback for `failed`.
pub type FailedFn = Box<dyn Fn(State, &anyhow::Error) + Sync + Send + 'static>;

/// [`Listener`] built out of independent closures.
///
/// Any closure can be left out, in which case the matching method does
/// nothing.
#[derive(Default)]
pub struct FnListener {
    starting_fn: Option<NotifyFn>,
    running_fn: Option<NotifyFn>,
    stopping_fn: Option<FromFn>,
    terminated_fn: Option<FromFn>,
    failed_fn: Option<FailedFn>,
}

impl FnListener {
    /// Constructs a listener that ignores everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the closure called on `starting`.
    pub fn on_starting(mut self, f: impl Fn() + Sync + Send + 'static) -> Self {
        self.starting_fn = Some(Box::new(f));
        self
    }

    /// Sets the closure called on `running`.
    pub fn on_running(mut self, f: impl Fn() + Sync + Send + 'static) -> Self {
        self.running_fn = Some(Box::new(f));
        self
    }

    /// Sets the closure called on `stopping`.
    pub fn on_stopping(mut self, f: impl Fn(State) + Sync + Send + 'static) -> Self {
        self.stopping_fn = Some(Box::new(f));
        self
    }

    /// Sets the closure called on `terminated`.
    pub fn on_terminated(mut self, f: impl Fn(State) + Sync + Send + 'static) -> Self {
        self.terminated_fn = Some(Box::new(f));
        self
    }

    /// Sets the closure called on `failed`.
    pub fn on_failed(mut self, f: impl Fn(State, &anyhow::Error) + Sync + Send + 'static) -> Self {
        self.failed_fn = Some(Box::new(f));
        self
    }
}

/// Builds a listener from up to five closures, any of which may be `None`.
pub fn new_listener(
    starting: Option<NotifyFn>,
    running: Option<NotifyFn>,
    stopping: Option<FromFn>,
    terminated: Option<FromFn>,
    failed: Option<FailedFn>,
) -> FnListener {
    FnListener {
        starting_fn: starting,
        running_fn: running,
        stopping_fn: stopping,
        terminated_fn: terminated,
        failed_fn: failed,
    }
}

impl Listener for FnListener {
    fn starting(&self) {
        if let Some(f) = &self.starting_fn {
            f();
        }
    }

    fn running(&self) {
        if let Some(f) = &self.running_fn {
            f();
        }
    }

    fn stopping(&self, from: State) {
        if let Some(f) = &self.stopping_fn {
            f(from);
        }
    }

    fn terminated(&self, from: State) {
        if let Some(f) = &self.terminated_fn {
            f(from);
        }
    }

    fn failed(&self, from: State, failure: &anyhow::Error) {
        if let Some(f) = &self.failed_fn {
            f(from, failure);
        }
    }
}

impl fmt::Debug for FnListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener")
            .field("starting", &self.starting_fn.is_some())
            .field("running", &self.running_fn.is_some())
            .field("stopping", &self.stopping_fn.is_some())
            .field("terminated", &self.terminated_fn.is_some())
            .field("failed", &self.failed_fn.is_some())
            .finish()
    }
}
