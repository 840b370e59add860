//! Device and user document model
//!
//! Devices are semi-structured Firestore-style documents: a handful of fixed
//! fields plus a `states` map whose keys depend on the device's trait set.
//! The map is kept as `serde_json::Map` and read through typed accessors
//! rather than a per-trait schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The mutable per-device state map (`states` in the document).
pub type StateMap = Map<String, Value>;

/// A user document. Users are created externally; the backend only reads
/// the token and the homegraph flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDoc {
    /// Document key.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Opaque access token matched against the bearer token tail.
    pub fake_access_token: String,
    /// Whether homegraph reporting is enabled for this user.
    pub homegraph: bool,
}

/// A device document under `users/{userId}/devices/{deviceId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceDoc {
    /// Equal to the document key.
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Trait attributes; only `openDirection` is inspected by the engine.
    pub attributes: Map<String, Value>,
    /// Injected error code; empty string means healthy.
    pub error_code: String,
    /// Two-factor requirement: `""` none, `"ack"` acknowledgment, anything
    /// else is the expected PIN.
    pub tfa: String,
    /// Trait-dependent state leaves; `online` is required.
    pub states: StateMap,
}

impl DeviceDoc {
    /// Read a boolean state leaf.
    pub fn state_bool(&self, key: &str) -> Option<bool> {
        self.states.get(key).and_then(Value::as_bool)
    }

    /// Read an integer state leaf.
    pub fn state_i64(&self, key: &str) -> Option<i64> {
        self.states.get(key).and_then(Value::as_i64)
    }

    /// Whether the device document declares multi-direction OpenClose
    /// semantics (presence of `attributes.openDirection`).
    pub fn has_open_direction(&self) -> bool {
        self.attributes.contains_key("openDirection")
    }
}

/// Set a dotted-path field inside a document map, creating intermediate
/// objects as needed. A non-object value in the middle of the path is
/// replaced by an object, matching the store's implicit nested creation.
pub fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            root.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

/// Read a dotted-path field from a document map.
pub fn get_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => root.get(path),
        Some((head, rest)) => root.get(head).and_then(Value::as_object).and_then(|m| get_path(m, rest)),
    }
}
