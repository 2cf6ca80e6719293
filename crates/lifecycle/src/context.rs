//! Context handed to lifecycle hooks.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Context passed to every hook of a service.
///
/// This is the only way hooks should observe that the service has been asked
/// to stop.  Cancellation is one-way, once fired it stays fired.
#[derive(Clone, Debug)]
pub struct ServiceContext {
    token: CancellationToken,
    failure: Option<Arc<anyhow::Error>>,
}

impl ServiceContext {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self {
            token,
            failure: None,
        }
    }

    pub(crate) fn with_failure(mut self, failure: Option<Arc<anyhow::Error>>) -> Self {
        self.failure = failure;
        self
    }

    /// Returns if the service has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the service has been asked to stop.  Resolves immediately
    /// if that already happened.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Returns the underlying cancellation token, for passing down into code
    /// that takes one directly.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The error that drove the service into `Stopping`, if any.
    ///
    /// Only ever set in the context given to the stopping hook.
    pub fn failure_case(&self) -> Option<&anyhow::Error> {
        self.failure.as_deref()
    }
}
