//! Recorder - appends one observation row per completed poll attempt

use netwatch_common::{ConnectionState, HistoryStore, HostTarget, NewObservation, Observation, StoreError};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn HistoryStore>,
}

impl Recorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Appends exactly one row; storage failures are reported, never retried here
    pub async fn record(
        &self,
        target: &HostTarget,
        peer_address: String,
        state: ConnectionState,
    ) -> Result<Observation, StoreError> {
        let row = NewObservation {
            host_alias: target.alias.clone(),
            host_address: target.address.value.trim().to_string(),
            peer_address,
            state,
        };

        let store = self.store.clone();
        let result = match tokio::task::spawn_blocking(move || store.append(&row)).await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Unreachable(format!("append task aborted: {e}"))),
        };

        match &result {
            Ok(obs) if obs.state.is_failure() => warn!(
                host = %target.alias,
                address = %target.address.value,
                state = obs.state.as_str(),
                id = obs.id,
                "failure recorded"
            ),
            Ok(obs) => info!(
                host = %target.alias,
                address = %target.address.value,
                state = obs.state.as_str(),
                id = obs.id,
                "observation recorded"
            ),
            Err(e) => warn!(host = %target.alias, address = %target.address.value, "failed to record observation: {e}"),
        }
        result
    }
}
