//! API-gateway request handlers.
//!
//! Uploads are addressed by the SHA-1 of their content and offered to the
//! blob-servers in dispatch order until one is reachable; downloads walk
//! the same order until a server produces the object. Replication lag is
//! why a candidate answering 404 is not the end of the road.

use super::types::ErrorResponse;
use super::GatewayState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sos_core::client::{metadata_headers, BlobPayload};
use sos_core::compute_hash;
use std::sync::Arc;

pub(crate) async fn upload(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let hash = compute_hash(&body);

    for server in state.registry.ordered_servers() {
        match state
            .client
            .store_blob(&server.location, &hash, body.clone(), &headers)
            .await
        {
            Ok(reply) => {
                // The node was reachable; its reply is relayed verbatim.
                // A content-addressed retry is always safe, so a client
                // seeing an upstream error can simply resubmit.
                tracing::debug!(
                    id = %hash,
                    server = %server.location,
                    status = %reply.status,
                    "upload dispatched"
                );
                return (reply.status, reply.body).into_response();
            }
            Err(error) => {
                tracing::debug!(server = %server.location, %error, "upload attempt failed");
            }
        }
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "upload failed".to_string(),
        }),
    )
        .into_response()
}

pub(crate) async fn fetch_blob(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Response {
    let id = strip_extension(&id);

    match locate(&state, id).await {
        Some(payload) => {
            let mut response = Response::new(Body::from(payload.body));
            for (name, value) in metadata_headers(&payload.headers) {
                response.headers_mut().insert(name, value);
            }
            response
        }
        None => all_servers_exhausted(),
    }
}

pub(crate) async fn head_fetch(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Response {
    let id = strip_extension(&id);

    match locate(&state, id).await {
        Some(_) => {
            let mut response = StatusCode::OK.into_response();
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
            response
        }
        None => all_servers_exhausted(),
    }
}

pub(crate) async fn missing() -> Response {
    (StatusCode::NOT_FOUND, "Invalid method or location.").into_response()
}

/// The first server in dispatch order that answers 200 with a non-empty
/// body wins. Transport errors and other statuses just mean "try the next
/// one": the object may only have reached part of the fleet so far.
async fn locate(state: &GatewayState, id: &str) -> Option<BlobPayload> {
    for server in state.registry.ordered_servers() {
        tracing::debug!(id = %id, server = %server.location, "attempting retrieval");

        let payload = match state.client.fetch_blob(&server.location, id).await {
            Ok(payload) => payload,
            Err(error) => {
                tracing::debug!(server = %server.location, %error, "retrieval failed");
                continue;
            }
        };

        if payload.status != StatusCode::OK {
            tracing::debug!(
                server = %server.location,
                status = %payload.status,
                "server does not hold the object"
            );
            continue;
        }
        if payload.body.is_empty() {
            continue;
        }

        tracing::debug!(id = %id, bytes = payload.body.len(), "found");
        return Some(payload);
    }

    None
}

fn all_servers_exhausted() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

/// Clients may fetch `{id}.png` and friends; everything from the final `.`
/// onwards is cosmetic and never part of the id.
fn strip_extension(id: &str) -> &str {
    match id.rfind('.') {
        Some(index) => &id[..index],
        None => id,
    }
}
