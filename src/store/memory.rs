//! In-memory document store
//!
//! Backs development runs and the test suite. Documents are plain JSON
//! objects behind one `parking_lot` lock per store; the lock is never held
//! across an await point, so single-document atomicity holds trivially.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::model::{set_path, DeviceDoc, UserDoc};

use super::{DeviceStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct UserEntry {
    fields: Map<String, Value>,
    devices: BTreeMap<String, Value>,
}

/// HashMap-backed store. `BTreeMap` keeps user iteration order stable so
/// "first matching user" is deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<BTreeMap<String, UserEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user document. The id becomes the document key; devices are
    /// added through the gateway surface.
    pub fn insert_user(&self, user: &UserDoc) {
        let value = serde_json::to_value(user).unwrap_or(Value::Null);
        let Value::Object(mut fields) = value else { return };
        fields.remove("id");
        let mut users = self.users.write();
        users.entry(user.id.clone()).or_default().fields = fields;
    }

    /// Seed a device document from a typed doc. Convenience for tests and
    /// development fixtures.
    pub fn insert_device(&self, user_id: &str, doc: &DeviceDoc) {
        let value = serde_json::to_value(doc).unwrap_or(Value::Null);
        let Value::Object(map) = value else { return };
        let mut users = self.users.write();
        users
            .entry(user_id.to_string())
            .or_default()
            .devices
            .insert(doc.device_id.clone(), Value::Object(map));
    }

    /// Raw document snapshot, for asserting exactly what was persisted.
    pub fn device_raw(&self, user_id: &str, device_id: &str) -> Option<Value> {
        let users = self.users.read();
        users
            .get(user_id)
            .and_then(|u| u.devices.get(device_id))
            .cloned()
    }

    fn decode_device(device_id: &str, raw: &Value) -> StoreResult<DeviceDoc> {
        let mut doc: DeviceDoc = serde_json::from_value(raw.clone())
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        if doc.device_id.is_empty() {
            doc.device_id = device_id.to_string();
        }
        Ok(doc)
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn get_devices(&self, user_id: &str) -> StoreResult<Vec<DeviceDoc>> {
        let users = self.users.read();
        let entry = users
            .get(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("users/{user_id}")))?;
        entry
            .devices
            .iter()
            .map(|(id, raw)| Self::decode_device(id, raw))
            .collect()
    }

    async fn get_device(&self, user_id: &str, device_id: &str) -> StoreResult<DeviceDoc> {
        let users = self.users.read();
        let raw = users
            .get(user_id)
            .and_then(|u| u.devices.get(device_id))
            .ok_or_else(|| StoreError::NotFound(format!("users/{user_id}/devices/{device_id}")))?;
        Self::decode_device(device_id, raw)
    }

    async fn update_fields(
        &self,
        user_id: &str,
        device_id: &str,
        updates: &[(String, Value)],
    ) -> StoreResult<()> {
        let mut users = self.users.write();
        let raw = users
            .get_mut(user_id)
            .and_then(|u| u.devices.get_mut(device_id))
            .ok_or_else(|| StoreError::NotFound(format!("users/{user_id}/devices/{device_id}")))?;
        if !raw.is_object() {
            *raw = Value::Object(Map::new());
        }
        if let Value::Object(doc) = raw {
            for (path, value) in updates {
                set_path(doc, path, value.clone());
            }
        }
        Ok(())
    }

    async fn set_device(
        &self,
        user_id: &str,
        device_id: &str,
        doc: Map<String, Value>,
    ) -> StoreResult<()> {
        let mut users = self.users.write();
        users
            .entry(user_id.to_string())
            .or_default()
            .devices
            .insert(device_id.to_string(), Value::Object(doc));
        Ok(())
    }

    async fn delete_device(&self, user_id: &str, device_id: &str) -> StoreResult<()> {
        let mut users = self.users.write();
        if let Some(entry) = users.get_mut(user_id) {
            entry.devices.remove(device_id);
        }
        Ok(())
    }

    async fn find_user_by_token(&self, access_token: &str) -> StoreResult<Option<String>> {
        let users = self.users.read();
        Ok(users
            .iter()
            .find(|(_, entry)| {
                entry.fields.get("fakeAccessToken").and_then(Value::as_str) == Some(access_token)
            })
            .map(|(id, _)| id.clone()))
    }

    async fn get_user_field(&self, user_id: &str, field: &str) -> StoreResult<Value> {
        let users = self.users.read();
        let entry = users
            .get(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("users/{user_id}")))?;
        Ok(entry.fields.get(field).cloned().unwrap_or(Value::Null))
    }

    async fn update_user_field(&self, user_id: &str, field: &str, value: Value) -> StoreResult<()> {
        let mut users = self.users.write();
        users
            .entry(user_id.to_string())
            .or_default()
            .fields
            .insert(field.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, token: &str) -> UserDoc {
        UserDoc {
            id: id.to_string(),
            fake_access_token: token.to_string(),
            homegraph: false,
        }
    }

    #[tokio::test]
    async fn update_fields_patches_nested_leaves() {
        let store = MemoryStore::new();
        store.insert_user(&user("u1", "t1"));
        store
            .set_device(
                "u1",
                "light-1",
                json!({"deviceId": "light-1", "states": {"online": true, "color": {}}})
                    .as_object()
                    .unwrap()
                    .clone(),
            )
            .await
            .unwrap();

        store
            .update_fields(
                "u1",
                "light-1",
                &[("states.color.spectrumRgb".to_string(), json!(255))],
            )
            .await
            .unwrap();

        let raw = store.device_raw("u1", "light-1").unwrap();
        assert_eq!(raw["states"]["color"]["spectrumRgb"], json!(255));
        // Sibling fields untouched.
        assert_eq!(raw["states"]["online"], json!(true));
    }

    #[tokio::test]
    async fn update_fields_on_missing_device_is_not_found() {
        let store = MemoryStore::new();
        store.insert_user(&user("u1", "t1"));
        let err = store
            .update_fields("u1", "ghost", &[("states.on".to_string(), json!(true))])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_user_by_token_returns_first_match() {
        let store = MemoryStore::new();
        store.insert_user(&user("alice", "shared"));
        store.insert_user(&user("bob", "shared"));
        store.insert_user(&user("carol", "other"));

        let hit = store.find_user_by_token("shared").await.unwrap();
        assert_eq!(hit.as_deref(), Some("alice"));
        assert_eq!(store.find_user_by_token("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn user_fields_read_and_write() {
        let store = MemoryStore::new();
        store.insert_user(&user("u1", "t1"));
        assert_eq!(store.get_user_field("u1", "homegraph").await.unwrap(), json!(false));
        store
            .update_user_field("u1", "homegraph", json!(true))
            .await
            .unwrap();
        assert_eq!(store.get_user_field("u1", "homegraph").await.unwrap(), json!(true));
        // Absent fields read as null, not an error.
        assert_eq!(store.get_user_field("u1", "nope").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn delete_device_removes_document() {
        let store = MemoryStore::new();
        store.insert_user(&user("u1", "t1"));
        store
            .set_device("u1", "d1", Map::new())
            .await
            .unwrap();
        store.delete_device("u1", "d1").await.unwrap();
        assert!(store.device_raw("u1", "d1").is_none());
        assert!(store.get_devices("u1").await.unwrap().is_empty());
    }
}
