//! Bearer-token to user resolution
//!
//! The assistant presents `Authorization: Bearer <opaque>`; the opaque tail
//! is matched against `users.fakeAccessToken`. A missing header falls back
//! to a fixed development token so local testing works without account
//! linking.

use crate::error::{ExecuteError, ExecuteResult};
use crate::store::DeviceStore;

/// Development fallback used when no authorization header is present.
pub const DEV_BEARER_TOKEN: &str = "Bearer 123access";

/// Resolve a bearer token to the first matching user id.
pub async fn resolve_user(
    store: &dyn DeviceStore,
    bearer: Option<&str>,
) -> ExecuteResult<String> {
    let bearer = bearer.unwrap_or(DEV_BEARER_TOKEN);
    let token = bearer.strip_prefix("Bearer ").unwrap_or(bearer);
    match store.find_user_by_token(token).await? {
        Some(user_id) => Ok(user_id),
        None => {
            tracing::warn!("no user matched the presented access token");
            Err(ExecuteError::NoUser)
        }
    }
}
