//! Device start/stop commands.
//!
//! Control requests go straight to the pool and return a synchronous
//! outcome; the rig cache is not touched. The pool applies the state
//! change asynchronously on its side, so callers observe the new device
//! state only after a subsequent rigs refresh.

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};

use crate::client::MiningApi;
use crate::tracing::prelude::*;

/// Mining state to request for a device. Serializes to the wire strings
/// `"START"` / `"STOP"`.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DeviceAction {
    Start,
    Stop,
}

/// Result of a control request. `success` is false for transport
/// failures and pool-side rejections alike; `message` is human-readable
/// either way. Callers issuing a switch toggle need an always-returning
/// answer, so this is a value, not an error.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

/// Request `action` for one device of one rig.
pub async fn toggle_device(
    api: &dyn MiningApi,
    rig_id: &str,
    device_id: &str,
    action: DeviceAction,
) -> CommandOutcome {
    match api.set_device_state(rig_id, device_id, action).await {
        Ok(response) => outcome_from_response(device_id, action, &response),
        Err(err) => {
            warn!(rig = rig_id, device = device_id, %action, error = %err, "device command failed");
            CommandOutcome {
                success: false,
                message: err.to_string(),
            }
        }
    }
}

/// Shape an outcome from the control endpoint's response body. A body
/// without a `success` field counts as a rejection.
fn outcome_from_response(device_id: &str, action: DeviceAction, response: &Value) -> CommandOutcome {
    let success = response
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if success {
                format!("{action} accepted for device {device_id}")
            } else {
                format!("{action} rejected for device {device_id}")
            }
        });

    CommandOutcome { success, message }
}
