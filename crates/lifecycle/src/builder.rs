//! Service builder.

use std::fmt;

use crate::{
    BasicService, Listener, RunningFn, ServiceContext, StartingFn, StoppingFn,
    basic::Hooks,
    types::{hook, noop_hook},
};

/// Builder to help with constructing services.
///
/// Every hook is optional.  A missing starting or stopping hook does nothing,
/// a missing running hook waits until the service is asked to stop.
pub struct ServiceBuilder {
    name: Option<String>,
    starting: Option<StartingFn>,
    running: Option<RunningFn>,
    stopping: Option<StoppingFn>,
    listeners: Vec<Box<dyn Listener>>,
}

impl ServiceBuilder {
    /// Constructs an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name used for the service in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the starting hook.
    pub fn with_starting(mut self, f: StartingFn) -> Self {
        self.starting = Some(f);
        self
    }

    /// Sets the running hook.
    pub fn with_running(mut self, f: RunningFn) -> Self {
        self.running = Some(f);
        self
    }

    /// Sets the stopping hook.
    pub fn with_stopping(mut self, f: StoppingFn) -> Self {
        self.stopping = Some(f);
        self
    }

    /// Adds a listener, registered when the service is built.
    pub fn with_listener(mut self, listener: impl Listener) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Builds the service, in `New`.
    pub fn build(self) -> BasicService {
        let hooks = Hooks {
            starting: self.starting.unwrap_or_else(noop_hook),
            running: self.running.unwrap_or_else(wait_for_stop),
            stopping: self.stopping.unwrap_or_else(noop_hook),
        };

        let name = self.name.unwrap_or_else(|| "service".to_owned());
        let svc = BasicService::from_hooks(name, hooks);
        for l in self.listeners {
            svc.add_boxed_listener(l);
        }

        svc
    }
}

/// Running hook that just waits to be told to stop.
pub(crate) fn wait_for_stop() -> RunningFn {
    hook(|ctx: ServiceContext| async move {
        ctx.cancelled().await;
        Ok(())
    })
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self {
            name: None,
            starting: None,
            running: None,
            stopping: None,
            listeners: Vec::new(),
        }
    }
}

impl fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("name", &self.name)
            .field("starting", &self.starting.is_some())
            .field("running", &self.running.is_some())
            .field("stopping", &self.stopping.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{FnListener, State};

    #[tokio::test]
    async fn test_defaults() {
        let svc = ServiceBuilder::new().build();
        assert_eq!(svc.name(), "service");

        svc.start_async().expect("test: start");
        svc.await_running().await.expect("test: running");
        svc.stop_async();
        svc.await_terminated().await.expect("test: terminated");
    }

    #[tokio::test]
    async fn test_named_with_listener() {
        let terminated = Arc::new(AtomicUsize::new(0));
        let t2 = terminated.clone();

        let svc = ServiceBuilder::new()
            .with_name("indexer")
            .with_starting(hook(|_| async { Ok(()) }))
            .with_listener(FnListener::new().on_terminated(move |from| {
                if from == State::Stopping {
                    t2.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .build();
        assert_eq!(svc.name(), "indexer");
        assert_eq!(svc.monitor().name(), "indexer");

        svc.start_async().expect("test: start");
        svc.await_running().await.expect("test: running");
        svc.stop_async();
        svc.await_terminated().await.expect("test: terminated");

        while terminated.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }
}
