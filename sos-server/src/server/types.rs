use serde::Serialize;

/// Reply to a successful `POST /blob/{id}`.
#[derive(Debug, Serialize)]
pub(crate) struct StoreResponse {
    pub id: String,
    pub status: String,
    pub size: usize,
}

/// Reply when the gateway exhausts every blob-server on upload.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}
