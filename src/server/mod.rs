//! Request adapter
//!
//! Thin axum surface translating the assistant's EXECUTE payload (and the
//! sibling intent helpers) into facade calls. Execution failures are part
//! of the assistant contract and travel in-band as `{"errorCode": tag}`
//! with a 200; infrastructure failures map to HTTP errors.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::engine::Execution;
use crate::error::ExecuteError;
use crate::home::{DevicePatch, HomeService};
use crate::store::StoreError;

/// EXECUTE payload from the assistant intent handler.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub user_id: String,
    pub device_id: String,
    pub execution: Execution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    user_id: String,
}

/// Build the fulfillment router over one shared [`HomeService`].
pub fn router(home: HomeService) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/user", get(user_id))
        .route("/users/{user_id}/devices", get(list_devices).post(add_device))
        .route(
            "/users/{user_id}/devices/{device_id}",
            axum::routing::patch(update_device).delete(delete_device),
        )
        .route("/users/{user_id}/devices/{device_id}/state", get(device_state))
        .route("/users/{user_id}/homegraph", get(homegraph).put(set_homegraph))
        .with_state(home)
}

/// Bind and serve until the process is stopped.
pub async fn serve(listen: &str, home: HomeService) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(addr = %listener.local_addr()?, "serving fulfillment api");
    axum::serve(listener, router(home)).await
}

fn failure(err: ExecuteError) -> Response {
    match &err {
        ExecuteError::Store(StoreError::NotFound(path)) => {
            (StatusCode::NOT_FOUND, Json(json!({"error": format!("not found: {path}")})))
                .into_response()
        }
        ExecuteError::Store(_) => {
            tracing::error!(error = %err, "store failure");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"errorCode": "storeUnavailable"})),
            )
                .into_response()
        }
        ExecuteError::NoUser => {
            (StatusCode::UNAUTHORIZED, Json(json!({"errorCode": "noUser"}))).into_response()
        }
        // Everything else is contract vocabulary the assistant consumes.
        _ => Json(json!({"errorCode": err.tag()})).into_response(),
    }
}

async fn execute(State(home): State<HomeService>, Json(req): Json<ExecuteRequest>) -> Response {
    match home.execute(&req.user_id, &req.device_id, &req.execution).await {
        Ok(states) => Json(json!({"states": states})).into_response(),
        Err(err) => failure(err),
    }
}

async fn user_id(State(home): State<HomeService>, headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match home.get_user_id(bearer).await {
        Ok(user_id) => Json(UserResponse { user_id }).into_response(),
        Err(err) => failure(err),
    }
}

async fn list_devices(State(home): State<HomeService>, Path(user_id): Path<String>) -> Response {
    match home.get_devices(&user_id).await {
        Ok(devices) => Json(devices).into_response(),
        Err(err) => failure(err),
    }
}

async fn add_device(
    State(home): State<HomeService>,
    Path(user_id): Path<String>,
    Json(data): Json<Map<String, Value>>,
) -> Response {
    match home.add_device(&user_id, data).await {
        Ok(device_id) => (
            StatusCode::CREATED,
            Json(json!({"deviceId": device_id})),
        )
            .into_response(),
        Err(err) => failure(err),
    }
}

async fn update_device(
    State(home): State<HomeService>,
    Path((user_id, device_id)): Path<(String, String)>,
    Json(patch): Json<DevicePatch>,
) -> Response {
    match home.update_device(&user_id, &device_id, patch).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(err),
    }
}

async fn delete_device(
    State(home): State<HomeService>,
    Path((user_id, device_id)): Path<(String, String)>,
) -> Response {
    match home.delete_device(&user_id, &device_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(err),
    }
}

async fn device_state(
    State(home): State<HomeService>,
    Path((user_id, device_id)): Path<(String, String)>,
) -> Response {
    match home.get_state(&user_id, &device_id).await {
        Ok(states) => Json(states).into_response(),
        Err(err) => failure(err),
    }
}

async fn homegraph(State(home): State<HomeService>, Path(user_id): Path<String>) -> Response {
    match home.is_homegraph_enabled(&user_id).await {
        Ok(enabled) => Json(json!({"homegraph": enabled})).into_response(),
        Err(err) => failure(err),
    }
}

async fn set_homegraph(
    State(home): State<HomeService>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let enable = body
        .get("homegraph")
        .and_then(Value::as_bool)
        .or_else(|| body.as_bool());
    let Some(enable) = enable else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "expected a boolean homegraph flag"})),
        )
            .into_response();
    };
    match home.set_homegraph(&user_id, enable).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(err),
    }
}
