//! State monitor handle.

use tokio::sync::watch;

use crate::{ServiceError, State};

/// Read-only handle onto the state of a service.
///
/// Cheap to clone.  Any number of these can observe a service while its
/// lifecycle task remains the only writer.
#[derive(Clone, Debug)]
pub struct ServiceMonitor {
    name: String,
    state_rx: watch::Receiver<State>,
}

impl ServiceMonitor {
    pub(crate) fn new(name: String, state_rx: watch::Receiver<State>) -> Self {
        Self { name, state_rx }
    }

    /// Name of the monitored service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state.
    pub fn get_current(&self) -> State {
        *self.state_rx.borrow()
    }

    /// Returns the current state along with the service name as a JSON
    /// object.
    pub fn fetch_status_json(&self) -> anyhow::Result<serde_json::Value> {
        let state = self.get_current();
        Ok(serde_json::json!({
            "name": self.name,
            "state": serde_json::to_value(state)?,
        }))
    }

    /// Waits until the state satisfies `pred`, returning that state.
    ///
    /// Returns immediately if it already does.
    pub async fn wait_for(&self, pred: impl FnMut(&State) -> bool) -> Result<State, ServiceError> {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(pred)
            .await
            .map_err(|_| ServiceError::LifecycleExited)?;
        Ok(*state)
    }

    /// Waits until the service reaches a terminal state, returning it.
    pub async fn wait_terminal(&self) -> Result<State, ServiceError> {
        self.wait_for(State::is_terminal).await
    }
}
