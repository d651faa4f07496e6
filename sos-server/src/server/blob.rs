//! Blob-server request handlers: a content-addressed key/value store over
//! HTTP.

use super::types::StoreResponse;
use super::BlobState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sos_core::{valid_id, MetadataMap};
use std::sync::Arc;

/// The id check is the sole defense against directory traversal, so every
/// `/blob/{id}` handler runs it before touching storage.
const INVALID_ID_BODY: &str = "Alphanumeric IDs only.\n";

const NOT_FOUND_BODY: &str = "404 - content is not hosted here.";

pub(crate) async fn alive() -> &'static str {
    "alive"
}

pub(crate) async fn get_blob(
    State(state): State<Arc<BlobState>>,
    Path(id): Path<String>,
) -> Response {
    if !valid_id(&id) {
        return invalid_id();
    }

    let (data, metadata) = match state.storage.get(&id).await {
        Ok(Some(blob)) => blob,
        Ok(None) => return not_found(),
        Err(error) => {
            tracing::warn!(id = %id, %error, "storage read failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read storage").into_response();
        }
    };

    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    for (key, value) in &metadata {
        let Ok(value) = HeaderValue::from_str(value) else {
            continue;
        };
        // X-Mime-Type doubles as the Content-Type of the reply, and is
        // still echoed verbatim so callers can see the original header.
        if key.eq_ignore_ascii_case("x-mime-type") {
            headers.insert(header::CONTENT_TYPE, value.clone());
        }
        let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
            continue;
        };
        headers.insert(name, value);
    }
    response
}

pub(crate) async fn head_blob(
    State(state): State<Arc<BlobState>>,
    Path(id): Path<String>,
) -> Response {
    if !valid_id(&id) {
        return invalid_id();
    }

    let status = if state.storage.exists(&id).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    let mut response = status.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

pub(crate) async fn store_blob(
    State(state): State<Arc<BlobState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !valid_id(&id) {
        return invalid_id();
    }

    // Every X-header on the request is sideband metadata, persisted and
    // restored on later fetches. First value wins for repeated names.
    let mut metadata = MetadataMap::new();
    for name in headers.keys() {
        if !name.as_str().starts_with("x-") {
            continue;
        }
        if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok()) {
            metadata.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let size = body.len();
    if let Err(error) = state.storage.store(&id, body, &metadata).await {
        tracing::warn!(id = %id, %error, "store failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to write to storage").into_response();
    }

    Json(StoreResponse {
        id,
        status: "OK".to_string(),
        size,
    })
    .into_response()
}

pub(crate) async fn list_blobs(State(state): State<Arc<BlobState>>) -> Response {
    match state.storage.existing().await {
        Ok(list) => Json(list).into_response(),
        Err(error) => {
            tracing::warn!(%error, "listing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read storage").into_response()
        }
    }
}

pub(crate) async fn missing() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

fn invalid_id() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, INVALID_ID_BODY).into_response()
}
