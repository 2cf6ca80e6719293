//! Basic service runtime.
//!
//! [`BasicService`] owns the state of a service and drives its three hooks
//! through the lifecycle:
//!
//! ```text
//! New -> Starting -> Running -> Stopping -> Terminated
//!           |           |          |
//!           +-----------+----------+-----> Failed
//! ```
//!
//! A service that is stopped before it was ever started goes straight from
//! `New` to `Terminated` without running any hook.
//!
//! If both the running hook and the stopping hook fail, the running hook's
//! error is kept as the failure case and the stopping hook's error is only
//! logged.

use std::{
    any::Any,
    fmt,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::FutureExt;
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
};
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::{
    HookFuture, Listener, RunningFn, ServiceContext, ServiceError, ServiceMonitor, StartingFn,
    State, StoppingFn,
};

/// The three hooks of a service, consumed on start.
pub(crate) struct Hooks {
    pub(crate) starting: StartingFn,
    pub(crate) running: RunningFn,
    pub(crate) stopping: StoppingFn,
}

/// A queued listener notification.
#[derive(Clone, Debug)]
enum Notification {
    Starting,
    Running,
    Stopping(State),
    Terminated(State),
    Failed(State, Arc<anyhow::Error>),
}

impl Notification {
    fn apply(&self, listener: &dyn Listener) {
        match self {
            Self::Starting => listener.starting(),
            Self::Running => listener.running(),
            Self::Stopping(from) => listener.stopping(*from),
            Self::Terminated(from) => listener.terminated(*from),
            Self::Failed(from, failure) => listener.failed(*from, failure),
        }
    }
}

/// Mutable parts of the service, guarded together so that a transition,
/// its recorded failure and its listener notifications are published
/// atomically.
struct Shared {
    hooks: Option<Hooks>,
    failure: Option<(State, Arc<anyhow::Error>)>,
    listeners: Vec<mpsc::UnboundedSender<Notification>>,
}

struct Inner {
    name: String,
    state_tx: watch::Sender<State>,
    token: CancellationToken,
    shared: Mutex<Shared>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        // Nothing we do under the lock can leave it half-updated.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> State {
        *self.state_tx.borrow()
    }

    /// Moves to `to`, queueing `notif` for every listener.  Must be called
    /// with the lock held, which is what keeps state changes single-writer.
    fn transition(&self, sh: &mut Shared, to: State, notif: Notification) {
        let from = self.state();
        if !from.can_transition_to(to) {
            error!(service = %self.name, %from, %to, "refusing invalid state transition");
            return;
        }

        self.state_tx.send_modify(|s| *s = to);
        debug!(service = %self.name, %from, %to, "service state changed");

        sh.listeners.retain(|tx| {
            let ok = tx.send(notif.clone()).is_ok();
            if !ok {
                warn!(service = %self.name, %to, "listener gone, dropping its notifications");
            }
            ok
        });
        if to.is_terminal() {
            // Nothing more will be sent, this ends the listener drivers.
            sh.listeners.clear();
        }
    }

    fn set_running(&self) {
        let mut sh = self.lock();
        self.transition(&mut sh, State::Running, Notification::Running);
    }

    fn set_stopping(&self) {
        let mut sh = self.lock();
        let from = self.state();
        self.transition(&mut sh, State::Stopping, Notification::Stopping(from));
    }

    fn set_terminated(&self) {
        let mut sh = self.lock();
        let from = self.state();
        self.transition(&mut sh, State::Terminated, Notification::Terminated(from));
    }

    fn set_failed(&self, failure: Arc<anyhow::Error>) {
        let mut sh = self.lock();
        let from = self.state();
        sh.failure = Some((from, failure.clone()));
        self.transition(&mut sh, State::Failed, Notification::Failed(from, failure));
    }
}

/// Service driven through the standard lifecycle by a set of hooks.
///
/// This is a cheap handle, clones refer to the same service.
#[derive(Clone)]
pub struct BasicService {
    inner: Arc<Inner>,
}

impl BasicService {
    /// Creates a new service in `New` from its three hooks.
    ///
    /// See [`ServiceBuilder`](crate::ServiceBuilder) for setting a name or
    /// leaving hooks out.
    pub fn new(starting: StartingFn, running: RunningFn, stopping: StoppingFn) -> Self {
        Self::from_hooks(
            "service".to_owned(),
            Hooks {
                starting,
                running,
                stopping,
            },
        )
    }

    pub(crate) fn from_hooks(name: String, hooks: Hooks) -> Self {
        let (state_tx, _) = watch::channel(State::New);
        let shared = Shared {
            hooks: Some(hooks),
            failure: None,
            listeners: Vec::new(),
        };

        Self {
            inner: Arc::new(Inner {
                name,
                state_tx,
                token: CancellationToken::new(),
                shared: Mutex::new(shared),
            }),
        }
    }

    /// Name of the service, as it appears in logs.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.inner.state()
    }

    /// Returns a read-only handle onto the state of the service.
    pub fn monitor(&self) -> ServiceMonitor {
        ServiceMonitor::new(self.inner.name.clone(), self.inner.state_tx.subscribe())
    }

    /// Returns the error that failed the service, if it failed.
    pub fn failure_case(&self) -> Option<Arc<anyhow::Error>> {
        self.inner.lock().failure.as_ref().map(|(_, f)| f.clone())
    }

    /// Moves the service from `New` to `Starting` and launches its lifecycle
    /// on the current tokio runtime.  Returns as soon as it is launched.
    ///
    /// Outside of a tokio runtime this errors and leaves the service in `New`.
    pub fn start_async(&self) -> Result<(), ServiceError> {
        let handle = Handle::try_current().map_err(|_| ServiceError::NoRuntime)?;
        let hooks = {
            let mut sh = self.inner.lock();
            let actual = self.inner.state();
            let hooks = match sh.hooks.take() {
                Some(hooks) if actual == State::New => hooks,
                _ => {
                    return Err(ServiceError::InvalidState {
                        expected: State::New,
                        actual,
                    });
                }
            };

            self.inner
                .transition(&mut sh, State::Starting, Notification::Starting);
            hooks
        };

        handle.spawn(lifecycle_task(self.inner.clone(), hooks));
        Ok(())
    }

    /// Asks the service to stop.  Safe to call any number of times, from any
    /// state.
    ///
    /// A service that was never started goes straight to `Terminated`.
    pub fn stop_async(&self) {
        let mut sh = self.inner.lock();
        match self.inner.state() {
            State::New => {
                sh.hooks = None;
                self.inner.transition(
                    &mut sh,
                    State::Terminated,
                    Notification::Terminated(State::New),
                );
            }
            State::Starting | State::Running => {
                debug!(service = %self.inner.name, "stop requested");
            }
            _ => {}
        }

        self.inner.token.cancel();
    }

    /// Waits for the service to reach `Running`.
    ///
    /// Errors if the service ends up in any later state instead.
    pub async fn await_running(&self) -> Result<(), ServiceError> {
        let state = self.monitor().wait_for(|s| *s >= State::Running).await?;
        if state == State::Running {
            return Ok(());
        }

        Err(ServiceError::NotRunning {
            state,
            failure: self.failure_case(),
        })
    }

    /// Waits for the service to reach a terminal state.
    ///
    /// Returns the failure case if it ended up in `Failed`.
    pub async fn await_terminated(&self) -> Result<(), ServiceError> {
        let state = self.monitor().wait_terminal().await?;
        if state == State::Terminated {
            return Ok(());
        }

        match self.inner.lock().failure.clone() {
            Some((from, failure)) => Err(ServiceError::Failed { from, failure }),
            None => Err(ServiceError::LifecycleExited),
        }
    }

    /// Registers a listener for all future transitions.
    ///
    /// Notifications are delivered in transition order on a task dedicated to
    /// this listener, so a slow listener never holds up the service.  Nothing
    /// is registered if the service has already reached a terminal state.
    pub fn add_listener(&self, listener: impl Listener) {
        self.add_boxed_listener(Box::new(listener));
    }

    pub(crate) fn add_boxed_listener(&self, listener: Box<dyn Listener>) {
        let mut sh = self.inner.lock();
        if self.inner.state().is_terminal() {
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        sh.listeners.push(tx);
        spawn_listener_driver(listener, rx);
    }
}

impl fmt::Debug for BasicService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicService")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Runs notifications for one listener in order until the service is done
/// with it.
fn spawn_listener_driver(
    listener: Box<dyn Listener>,
    mut rx: mpsc::UnboundedReceiver<Notification>,
) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                while let Some(notif) = rx.recv().await {
                    deliver(&*listener, &notif);
                }
            });
        }

        // Without a runtime around we still have to deliver, so use a thread.
        Err(_) => {
            std::thread::spawn(move || {
                while let Some(notif) = rx.blocking_recv() {
                    deliver(&*listener, &notif);
                }
            });
        }
    }
}

/// Applies one notification.  A panicking listener is logged and keeps
/// getting the notifications after it.
fn deliver(listener: &dyn Listener, notif: &Notification) {
    let res = std::panic::catch_unwind(AssertUnwindSafe(|| notif.apply(listener)));
    if let Err(panic) = res {
        let info = try_conv_panic(&*panic).unwrap_or_default();
        error!(?notif, %info, "listener panicked handling notification");
    }
}

async fn lifecycle_task(inner: Arc<Inner>, hooks: Hooks) {
    let service = inner.name.clone();
    let ctx = ServiceContext::new(inner.token.clone());

    let starting_span = debug_span!("starting", %service);
    if let Err(e) = run_hook(hooks.starting, ctx.clone())
        .instrument(starting_span)
        .await
    {
        error!(%service, %e, "service failed to start");
        inner.set_failed(Arc::new(e));
        return;
    }

    inner.set_running();

    let running_span = debug_span!("running", %service);
    let mut failure = match run_hook(hooks.running, ctx.clone())
        .instrument(running_span)
        .await
    {
        Ok(()) => None,
        Err(e) => {
            error!(%service, %e, "service failed while running");
            Some(Arc::new(e))
        }
    };

    inner.set_stopping();

    // The running hook can return without being asked to.
    inner.token.cancel();

    let stopping_span = debug_span!("stopping", %service);
    let stop_ctx = ctx.with_failure(failure.clone());
    if let Err(e) = run_hook(hooks.stopping, stop_ctx)
        .instrument(stopping_span)
        .await
    {
        match &failure {
            Some(orig) => {
                warn!(%service, %e, %orig, "stopping hook failed after earlier failure, ignoring");
            }
            None => {
                error!(%service, %e, "service failed while stopping");
                failure = Some(Arc::new(e));
            }
        }
    }

    match failure {
        Some(failure) => inner.set_failed(failure),
        None => inner.set_terminated(),
    }
}

/// Invokes a hook, turning a panic in it into an error.
async fn run_hook(
    hook: Box<dyn FnOnce(ServiceContext) -> HookFuture + Send + 'static>,
    ctx: ServiceContext,
) -> anyhow::Result<()> {
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(move || hook(ctx))) {
        Ok(fut) => fut,
        Err(panic) => return Err(panic_to_error(&*panic).into()),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(panic_to_error(&*panic).into()),
    }
}

fn panic_to_error(panic: &(dyn Any + Send)) -> ServiceError {
    ServiceError::HookPanic(try_conv_panic(panic).unwrap_or_default())
}

fn try_conv_panic(panic: &(dyn Any + Send)) -> Option<String> {
    panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
}
