//! Command execution engine
//!
//! The trait-aware state-transition layer: a generic device command
//! (trait + parameters) becomes validated mutations on the device document.
//! Within one request the sequence is strict: load device → evaluate
//! preconditions → dispatch → persist → return the merged state. The engine
//! holds no state of its own; concurrent executions race only at the
//! document level, where each field-update call is atomic.

pub mod commands;
pub mod preconditions;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ExecuteResult;
use crate::model::StateMap;
use crate::store::DeviceStore;

/// One EXECUTE item from the assistant: command identifier, parameters, and
/// an optional out-of-band challenge (`ack` acknowledgment or PIN).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Execution {
    pub command: String,
    pub params: Map<String, Value>,
    pub challenge: Option<Map<String, Value>>,
}

/// Execute one command against one device and return the merged state: a
/// copy of the pre-command `states` overlaid with the fields the handler
/// explicitly echoes.
pub async fn execute(
    store: &dyn DeviceStore,
    user_id: &str,
    device_id: &str,
    execution: &Execution,
) -> ExecuteResult<StateMap> {
    let device = store.get_device(user_id, device_id).await?;
    let snapshot = device.states.clone();

    preconditions::check(&device, execution.challenge.as_ref())?;

    let outcome = commands::dispatch(&execution.command, &execution.params, &device, &snapshot)?;

    if !outcome.updates.is_empty() {
        store
            .update_fields(user_id, device_id, &outcome.updates)
            .await?;
    }

    tracing::debug!(
        user_id,
        device_id,
        command = %execution.command,
        writes = outcome.updates.len(),
        "command executed"
    );

    let mut states = snapshot;
    for (key, value) in outcome.echo {
        states.insert(key, value);
    }
    Ok(states)
}
