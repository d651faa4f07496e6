//! The two HTTP servers: the blob node that persists objects, and the
//! two-listener API gateway that fans requests out across blob-servers.

mod blob;
mod gateway;
mod types;

use axum::routing::{get, post};
use axum::Router;
use sos_core::{BlobClient, BlobStore, FilesystemStore, Result, ServerRegistry, SosError};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;

pub(crate) struct BlobState {
    pub(crate) storage: Arc<dyn BlobStore>,
}

pub(crate) struct GatewayState {
    pub(crate) registry: Arc<ServerRegistry>,
    pub(crate) client: BlobClient,
}

/// Launch the blob-server and serve until the process is stopped. A bind
/// failure is returned to the caller, which exits non-zero.
pub async fn run_blob_server(host: &str, port: u16, store: &str) -> Result<()> {
    let storage = FilesystemStore::new(store)?;
    let state = Arc::new(BlobState {
        storage: Arc::new(storage),
    });

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("blob-server available at http://{}/", addr);
    tracing::info!("uploads will be written beneath {}", store);

    axum::serve(listener, blob_router(state))
        .await
        .map_err(|error| SosError::Http(error.to_string()))
}

pub(crate) fn blob_router(state: Arc<BlobState>) -> Router {
    // Unknown paths and unknown methods alike get the stock 404, so the
    // method routers carry their own fallback instead of axum's default
    // 405. Only `/blob/{id}` answers HEAD.
    Router::new()
        .route("/alive", get(blob::alive).head(blob::missing).fallback(blob::missing))
        .route(
            "/blob/:id",
            get(blob::get_blob)
                .head(blob::head_blob)
                .post(blob::store_blob)
                .fallback(blob::missing),
        )
        .route(
            "/blobs",
            get(blob::list_blobs).head(blob::missing).fallback(blob::missing),
        )
        .fallback(blob::missing)
        .with_state(state)
}

/// Launch the upload and download listeners of the API gateway. The two
/// services share nothing but the registry and the outbound HTTP client.
pub async fn run_api_server(
    host: &str,
    upload_port: u16,
    download_port: u16,
    registry: Arc<ServerRegistry>,
) -> Result<()> {
    let state = Arc::new(GatewayState {
        registry,
        client: BlobClient::new(),
    });

    let upload_addr = format!("{}:{}", host, upload_port);
    let download_addr = format!("{}:{}", host, download_port);
    let upload_listener = TcpListener::bind(&upload_addr).await?;
    let download_listener = TcpListener::bind(&download_addr).await?;

    tracing::info!("upload service at http://{}/upload", upload_addr);
    tracing::info!("download service at http://{}/fetch/:id", download_addr);
    for entry in state.registry.servers() {
        tracing::info!(group = %entry.group, location = %entry.location, "blob-server");
    }

    let upload = tokio::spawn(
        axum::serve(upload_listener, upload_router(state.clone())).into_future(),
    );
    let download =
        tokio::spawn(axum::serve(download_listener, download_router(state)).into_future());

    let (upload_result, download_result) = tokio::try_join!(upload, download)
        .map_err(|error| SosError::Http(error.to_string()))?;
    upload_result?;
    download_result?;
    Ok(())
}

pub(crate) fn upload_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/upload", post(gateway::upload).fallback(gateway::missing))
        .fallback(gateway::missing)
        .with_state(state)
}

pub(crate) fn download_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(
            "/fetch/:id",
            get(gateway::fetch_blob)
                .head(gateway::head_fetch)
                .fallback(gateway::missing),
        )
        .fallback(gateway::missing)
        .with_state(state)
}
