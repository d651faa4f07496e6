//! HTTP client for the blob-server wire protocol, shared by the API
//! gateway and the replicator.

use crate::{Result, SosError};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};

/// The verbatim reply from a blob-server endpoint: the gateway relays it,
/// the replicator reads metadata headers off it.
#[derive(Debug)]
pub struct BlobPayload {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct BlobClient {
    client: Client,
}

impl BlobClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// `GET {location}/alive`: true iff the server answers 200.
    pub async fn alive(&self, location: &str) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/alive", location))
            .send()
            .await
            .map_err(|error| SosError::Http(error.to_string()))?;
        Ok(response.status() == StatusCode::OK)
    }

    /// `GET {location}/blobs`: the ids the server hosts.
    pub async fn list_blobs(&self, location: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/blobs", location))
            .send()
            .await
            .map_err(|error| SosError::Http(error.to_string()))?;

        if !response.status().is_success() {
            return Err(SosError::Http(format!(
                "blob listing failed: server={} status={}",
                location,
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|error| SosError::Http(error.to_string()))
    }

    /// `HEAD {location}/blob/{id}`: true iff the server holds the blob.
    pub async fn has_blob(&self, location: &str, id: &str) -> Result<bool> {
        let response = self
            .client
            .head(format!("{}/blob/{}", location, id))
            .send()
            .await
            .map_err(|error| SosError::Http(error.to_string()))?;
        Ok(response.status() == StatusCode::OK)
    }

    /// `GET {location}/blob/{id}`: the reply is returned whatever its
    /// status; callers decide what counts as a hit.
    pub async fn fetch_blob(&self, location: &str, id: &str) -> Result<BlobPayload> {
        let response = self
            .client
            .get(format!("{}/blob/{}", location, id))
            .send()
            .await
            .map_err(|error| SosError::Http(error.to_string()))?;
        Self::payload(response).await
    }

    /// `POST {location}/blob/{id}` with `body`; the `x-*` entries of
    /// `metadata` ride along as request headers.
    pub async fn store_blob(
        &self,
        location: &str,
        id: &str,
        body: Bytes,
        metadata: &HeaderMap,
    ) -> Result<BlobPayload> {
        let mut request = self
            .client
            .post(format!("{}/blob/{}", location, id))
            .body(body);
        for (name, value) in metadata_headers(metadata) {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|error| SosError::Http(error.to_string()))?;
        Self::payload(response).await
    }

    async fn payload(response: reqwest::Response) -> Result<BlobPayload> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|error| SosError::Http(error.to_string()))?;
        Ok(BlobPayload {
            status,
            headers,
            body,
        })
    }
}

/// The `x-*` subset of a header map: the sideband metadata the wire
/// protocol propagates. First value wins for names that repeat. Header
/// names are lowercase at this layer, which covers the canonical `X-`
/// forms on the wire.
pub fn metadata_headers(headers: &HeaderMap) -> Vec<(HeaderName, HeaderValue)> {
    headers
        .keys()
        .filter(|name| name.as_str().starts_with("x-"))
        .filter_map(|name| headers.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}
