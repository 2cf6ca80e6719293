//! Idle services.

use crate::{BasicService, ServiceBuilder, StartingFn, StoppingFn, builder::wait_for_stop};

/// Creates a service that does nothing while running, but still goes through
/// every state transition.
///
/// Its running phase only waits to be told to stop and never fails, so only
/// `starting` or `stopping` can fail the service.
pub fn new_idle_service(starting: StartingFn, stopping: StoppingFn) -> BasicService {
    idle_builder(starting, stopping).build()
}

/// Like [`new_idle_service`], but returns the builder so a name or listeners
/// can be attached first.
pub fn idle_builder(starting: StartingFn, stopping: StoppingFn) -> ServiceBuilder {
    ServiceBuilder::new()
        .with_starting(starting)
        .with_running(wait_for_stop())
        .with_stopping(stopping)
}
