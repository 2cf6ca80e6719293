//! Managed-service lifecycle framework.
//!
//! Every service goes through the same state machine, driven by up to three
//! hooks supplied by the caller:
//!
//! - **starting**, run once when the service is started.  Failing here fails
//!   the service without it ever running.
//! - **running**, the body of the service.  Must return promptly once its
//!   [`ServiceContext`] is cancelled.  Returning an error fails the service.
//! - **stopping**, run once on the way down, whatever the reason.  Its error
//!   is never dropped.
//!
//! [`BasicService`] drives those hooks on a tokio task and publishes every
//! transition to any registered [`Listener`]s, in order.
//!
//! On top of that there are two ready-made shapes:
//!
//! - [`new_idle_service`], which does nothing while running and exists for
//!   the sake of its lifecycle.
//! - [`new_timer_service`], which calls a function on a fixed interval until
//!   stopped or until the function fails.
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use strata_lifecycle::*;
//!
//! let svc = new_timer_service(
//!     Duration::from_secs(10),
//!     hook(|_| async { Ok(()) }),
//!     iteration(|_| async { poll_peers().await }),
//!     hook(|ctx| async move {
//!         if let Some(e) = ctx.failure_case() {
//!             warn!(%e, "poller going down");
//!         }
//!         Ok(())
//!     }),
//! )?;
//!
//! svc.add_listener(FnListener::new().on_failed(|from, e| {
//!     error!(%from, %e, "poller failed");
//! }));
//!
//! svc.start_async()?;
//! svc.await_running().await?;
//!
//! // ...
//!
//! svc.stop_async();
//! svc.await_terminated().await?;
//! ```

mod basic;
mod builder;
mod context;
mod errors;
mod idle;
mod listener;
mod monitor;
mod timer;
mod types;

pub use basic::BasicService;
pub use builder::ServiceBuilder;
pub use context::ServiceContext;
pub use errors::ServiceError;
pub use idle::{idle_builder, new_idle_service};
pub use listener::{FailedFn, FnListener, FromFn, Listener, NotifyFn, new_listener};
pub use monitor::ServiceMonitor;
pub use timer::{new_timer_service, timer_builder};
pub use types::*;
