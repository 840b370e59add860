//! Home service facade
//!
//! The inbound interface used by the assistant intent handlers: command
//! execution plus the device/user housekeeping the sibling intents (SYNC,
//! QUERY, DISCONNECT) rely on. Holds the single shared store handle; there
//! is no other process-wide state.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::auth;
use crate::engine::{self, Execution};
use crate::error::{ExecuteError, ExecuteResult};
use crate::model::{DeviceDoc, StateMap};
use crate::store::{DeviceStore, FieldUpdates, StoreError};

/// Partial device update; absent fields stay untouched.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub states: Option<StateMap>,
    pub error_code: Option<String>,
    pub tfa: Option<String>,
}

/// Shared service over one long-lived store handle.
#[derive(Clone)]
pub struct HomeService {
    store: Arc<dyn DeviceStore>,
}

impl HomeService {
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self { store }
    }

    /// Run one device command; see [`engine::execute`].
    pub async fn execute(
        &self,
        user_id: &str,
        device_id: &str,
        execution: &Execution,
    ) -> ExecuteResult<StateMap> {
        engine::execute(self.store.as_ref(), user_id, device_id, execution).await
    }

    /// All devices in the user's inventory.
    pub async fn get_devices(&self, user_id: &str) -> ExecuteResult<Vec<DeviceDoc>> {
        Ok(self.store.get_devices(user_id).await?)
    }

    /// Resolve a bearer token (or the development fallback) to a user id.
    pub async fn get_user_id(&self, bearer: Option<&str>) -> ExecuteResult<String> {
        auth::resolve_user(self.store.as_ref(), bearer).await
    }

    /// Whether homegraph reporting is enabled for the user.
    pub async fn is_homegraph_enabled(&self, user_id: &str) -> ExecuteResult<bool> {
        let flag = self.store.get_user_field(user_id, "homegraph").await?;
        Ok(flag.as_bool().unwrap_or(false))
    }

    /// Flip the homegraph reporting flag.
    pub async fn set_homegraph(&self, user_id: &str, enable: bool) -> ExecuteResult<()> {
        self.store
            .update_user_field(user_id, "homegraph", Value::Bool(enable))
            .await?;
        Ok(())
    }

    /// Patch the supplied device fields, leaving the rest of the document
    /// alone.
    pub async fn update_device(
        &self,
        user_id: &str,
        device_id: &str,
        patch: DevicePatch,
    ) -> ExecuteResult<()> {
        let mut updates: FieldUpdates = Vec::new();
        if let Some(name) = patch.name {
            updates.push(("name".into(), Value::String(name)));
        }
        if let Some(nickname) = patch.nickname {
            updates.push(("nickname".into(), Value::String(nickname)));
        }
        if let Some(states) = patch.states {
            updates.push(("states".into(), Value::Object(states)));
        }
        if let Some(error_code) = patch.error_code {
            updates.push(("errorCode".into(), Value::String(error_code)));
        }
        if let Some(tfa) = patch.tfa {
            updates.push(("tfa".into(), Value::String(tfa)));
        }
        if updates.is_empty() {
            return Ok(());
        }
        self.store
            .update_fields(user_id, device_id, &updates)
            .await?;
        Ok(())
    }

    /// Create (or replace) a device document. The document key comes from
    /// the payload's `deviceId`.
    pub async fn add_device(
        &self,
        user_id: &str,
        data: Map<String, Value>,
    ) -> ExecuteResult<String> {
        let device_id = data
            .get("deviceId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ExecuteError::Store(StoreError::Malformed(
                    "device payload is missing deviceId".to_string(),
                ))
            })?
            .to_string();
        self.store.set_device(user_id, &device_id, data).await?;
        tracing::info!(user_id, device_id = %device_id, "device added");
        Ok(device_id)
    }

    /// Remove a device document.
    pub async fn delete_device(&self, user_id: &str, device_id: &str) -> ExecuteResult<()> {
        self.store.delete_device(user_id, device_id).await?;
        tracing::info!(user_id, device_id, "device deleted");
        Ok(())
    }

    /// The raw `states` map of one device.
    pub async fn get_state(&self, user_id: &str, device_id: &str) -> ExecuteResult<StateMap> {
        let device = self.store.get_device(user_id, device_id).await?;
        Ok(device.states)
    }
}
