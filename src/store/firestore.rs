//! Firestore-backed document store
//!
//! Talks to the Firestore v1 REST API (or its emulator). Dotted-path field
//! updates map onto `PATCH` with `updateMask.fieldPaths`, which commits all
//! listed paths in one atomic write; the token lookup uses `:runQuery` with
//! an equality filter. Any transport error or unexpected status surfaces as
//! `StoreError::Unavailable` and is never retried here.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use url::Url;

use crate::model::{set_path, DeviceDoc};

use super::{DeviceStore, StoreError, StoreResult};

/// Gateway over the Firestore REST API. One instance per process; the inner
/// `reqwest::Client` is already safe to share across requests.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    base: Url,
    project_id: String,
    token: String,
}

/// Firestore document payload as returned by the REST API.
#[derive(Debug, Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryResult {
    document: Option<RestDocument>,
}

impl FirestoreStore {
    /// Build a store handle. The credential file holds a bearer token read
    /// once at startup (the emulator accepts any value).
    pub fn new(database_url: &str, project_id: &str, credentials: &Path) -> StoreResult<Self> {
        let base = Url::parse(database_url)
            .map_err(|e| StoreError::Unavailable(format!("bad database url: {e}")))?;
        let token = std::fs::read_to_string(credentials)
            .map_err(|e| {
                StoreError::Unavailable(format!(
                    "cannot read credential file {}: {e}",
                    credentials.display()
                ))
            })?
            .trim()
            .to_string();
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            project_id: project_id.to_string(),
            token,
        })
    }

    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.project_id
        )
    }

    fn doc_url(&self, path: &str) -> StoreResult<Url> {
        self.base
            .join(&format!("v1/{}/{path}", self.documents_root()))
            .map_err(|e| StoreError::Unavailable(format!("bad document path {path}: {e}")))
    }

    fn device_path(user_id: &str, device_id: &str) -> String {
        format!("users/{user_id}/devices/{device_id}")
    }

    async fn check(path: &str, response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "{path}: unexpected status {status}"
            )));
        }
        Ok(response)
    }

    async fn fetch_document(&self, path: &str) -> StoreResult<RestDocument> {
        let response = self
            .client
            .get(self.doc_url(path)?)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check(path, response).await?;
        Ok(response.json::<RestDocument>().await?)
    }

    fn decode_device(doc: &RestDocument) -> StoreResult<DeviceDoc> {
        let raw = Value::Object(decode_fields(&doc.fields));
        let mut device: DeviceDoc =
            serde_json::from_value(raw).map_err(|e| StoreError::Malformed(e.to_string()))?;
        if device.device_id.is_empty() {
            if let Some(id) = doc.name.rsplit('/').next() {
                device.device_id = id.to_string();
            }
        }
        Ok(device)
    }
}

#[async_trait]
impl DeviceStore for FirestoreStore {
    async fn get_devices(&self, user_id: &str) -> StoreResult<Vec<DeviceDoc>> {
        let path = format!("users/{user_id}/devices");
        let mut devices = Vec::new();
        let mut page_token: Option<String> = None;
        // The list endpoint paginates; follow the cursor until it runs out.
        loop {
            let mut url = self.doc_url(&path)?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            let response = Self::check(&path, response).await?;
            let page = response.json::<ListDocumentsResponse>().await?;
            for doc in &page.documents {
                devices.push(Self::decode_device(doc)?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(devices),
            }
        }
    }

    async fn get_device(&self, user_id: &str, device_id: &str) -> StoreResult<DeviceDoc> {
        let doc = self
            .fetch_document(&Self::device_path(user_id, device_id))
            .await?;
        Self::decode_device(&doc)
    }

    async fn update_fields(
        &self,
        user_id: &str,
        device_id: &str,
        updates: &[(String, Value)],
    ) -> StoreResult<()> {
        let path = Self::device_path(user_id, device_id);
        let mut url = self.doc_url(&path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (field_path, _) in updates {
                pairs.append_pair("updateMask.fieldPaths", field_path);
            }
            // Patch must not create the document out of thin air.
            pairs.append_pair("currentDocument.exists", "true");
        }

        // Rebuild the listed paths as a nested document; the update mask
        // restricts the commit to exactly those leaves.
        let mut patch = Map::new();
        for (field_path, value) in updates {
            set_path(&mut patch, field_path, value.clone());
        }
        let body = json!({ "fields": encode_fields(&patch) });

        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(&path, response).await?;
        Ok(())
    }

    async fn set_device(
        &self,
        user_id: &str,
        device_id: &str,
        doc: Map<String, Value>,
    ) -> StoreResult<()> {
        let path = Self::device_path(user_id, device_id);
        let body = json!({ "fields": encode_fields(&doc) });
        let response = self
            .client
            .patch(self.doc_url(&path)?)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(&path, response).await?;
        Ok(())
    }

    async fn delete_device(&self, user_id: &str, device_id: &str) -> StoreResult<()> {
        let path = Self::device_path(user_id, device_id);
        let response = self
            .client
            .delete(self.doc_url(&path)?)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(&path, response).await?;
        Ok(())
    }

    async fn find_user_by_token(&self, access_token: &str) -> StoreResult<Option<String>> {
        let url = self
            .base
            .join(&format!("v1/{}:runQuery", self.documents_root()))
            .map_err(|e| StoreError::Unavailable(format!("bad query url: {e}")))?;
        let body = json!({
            "structuredQuery": {
                "from": [{"collectionId": "users"}],
                "where": {
                    "fieldFilter": {
                        "field": {"fieldPath": "fakeAccessToken"},
                        "op": "EQUAL",
                        "value": {"stringValue": access_token}
                    }
                },
                "limit": 1
            }
        });
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let response = Self::check("users:runQuery", response).await?;
        let results = response.json::<Vec<RunQueryResult>>().await?;
        Ok(results
            .into_iter()
            .filter_map(|r| r.document)
            .filter_map(|d| d.name.rsplit('/').next().map(str::to_string))
            .next())
    }

    async fn get_user_field(&self, user_id: &str, field: &str) -> StoreResult<Value> {
        let doc = self.fetch_document(&format!("users/{user_id}")).await?;
        Ok(doc
            .fields
            .get(field)
            .map(decode_value)
            .unwrap_or(Value::Null))
    }

    async fn update_user_field(&self, user_id: &str, field: &str, value: Value) -> StoreResult<()> {
        let path = format!("users/{user_id}");
        let mut url = self.doc_url(&path)?;
        url.query_pairs_mut()
            .append_pair("updateMask.fieldPaths", field)
            .append_pair("currentDocument.exists", "true");
        let body = json!({ "fields": { field: encode_value(&value) } });
        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(&path, response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Typed value codec
// ---------------------------------------------------------------------------

/// Encode a plain JSON value into the Firestore typed-value representation.
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // int64 travels as a decimal string on the wire.
                json!({"integerValue": i.to_string()})
            } else {
                json!({"doubleValue": n.as_f64()})
            }
        }
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => json!({
            "arrayValue": {"values": items.iter().map(encode_value).collect::<Vec<_>>()}
        }),
        Value::Object(map) => json!({"mapValue": {"fields": encode_fields(map)}}),
    }
}

fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode a Firestore typed value back into plain JSON.
fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    if let Some(i) = obj.get("integerValue") {
        let parsed = match i {
            Value::String(s) => s.parse::<i64>().ok(),
            other => other.as_i64(),
        };
        if let Some(n) = parsed {
            return Value::Number(Number::from(n));
        }
    }
    if let Some(d) = obj.get("doubleValue").and_then(Value::as_f64) {
        return Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Some(array) = obj.get("arrayValue") {
        let items = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(map) = obj.get("mapValue") {
        let fields = map
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .unwrap_or_default();
        return Value::Object(fields);
    }
    Value::Null
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}
