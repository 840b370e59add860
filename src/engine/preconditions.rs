//! Pre-dispatch gates
//!
//! Evaluated in a fixed order before any command may mutate state:
//! online gate, injected error code, then the two-factor challenge. The
//! evaluator only reads; it never touches the state map.

use serde_json::{Map, Value};

use crate::error::{ExecuteError, ExecuteResult};
use crate::model::DeviceDoc;

/// Run all gates against the pre-command document.
pub fn check(device: &DeviceDoc, challenge: Option<&Map<String, Value>>) -> ExecuteResult<()> {
    // A device without a boolean `online == true` cannot take commands.
    if !device.state_bool("online").unwrap_or(false) {
        return Err(ExecuteError::DeviceOffline);
    }

    if !device.error_code.is_empty() {
        return Err(ExecuteError::DeviceError(device.error_code.clone()));
    }

    check_two_factor(&device.tfa, challenge)
}

/// The two-factor decision table. `tfa == ""` requires nothing; `"ack"`
/// requires any challenge at all; any other value is the expected PIN.
fn check_two_factor(
    tfa: &str,
    challenge: Option<&Map<String, Value>>,
) -> ExecuteResult<()> {
    match (tfa, challenge) {
        ("", _) => Ok(()),
        ("ack", None) => Err(ExecuteError::AckNeeded),
        (_, None) => Err(ExecuteError::PinNeeded),
        (expected, Some(challenge)) => {
            match challenge.get("pin").and_then(Value::as_str) {
                Some(pin) if pin != expected => Err(ExecuteError::ChallengeFailedPinNeeded),
                // A missing pin passes; "ack" devices accept any challenge.
                _ => Ok(()),
            }
        }
    }
}
