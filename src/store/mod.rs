//! Device store gateway
//!
//! Narrow seam over the hosted document database. Documents live under the
//! hierarchical path `users/{userId}/devices/{deviceId}`; field-granular
//! updates address leaves with dotted paths (`states.color.spectrumRgb`).
//!
//! Single-document operations are atomic. Read-your-writes is part of the
//! contract: a read issued after an `update_fields` call returns reflects
//! that write. The engine never retries a failed store call.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::DeviceDoc;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A batch of dotted-path field updates applied in one atomic call.
pub type FieldUpdates = Vec<(String, Value)>;

/// Errors surfaced by the gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed document does not exist. A missing device is an
    /// external error, not part of the assistant-facing tag vocabulary.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Transport failure or unexpected store response.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The document exists but cannot be decoded into the expected shape.
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// The gateway interface. One long-lived handle per process, shared by all
/// in-flight requests.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// All device documents in the user's subcollection.
    async fn get_devices(&self, user_id: &str) -> StoreResult<Vec<DeviceDoc>>;

    /// Single-document read.
    async fn get_device(&self, user_id: &str, device_id: &str) -> StoreResult<DeviceDoc>;

    /// Atomic multi-field patch. Unlisted fields are untouched; nested
    /// intermediate objects are created implicitly.
    async fn update_fields(
        &self,
        user_id: &str,
        device_id: &str,
        updates: &[(String, Value)],
    ) -> StoreResult<()>;

    /// Replace-or-create a device document.
    async fn set_device(
        &self,
        user_id: &str,
        device_id: &str,
        doc: Map<String, Value>,
    ) -> StoreResult<()>;

    /// Delete a device document.
    async fn delete_device(&self, user_id: &str, device_id: &str) -> StoreResult<()>;

    /// Find the first user whose `fakeAccessToken` equals the token.
    async fn find_user_by_token(&self, access_token: &str) -> StoreResult<Option<String>>;

    /// Read one field of the user document. Absent fields read as `Null`.
    async fn get_user_field(&self, user_id: &str, field: &str) -> StoreResult<Value>;

    /// Write one field of the user document.
    async fn update_user_field(&self, user_id: &str, field: &str, value: Value) -> StoreResult<()>;
}
