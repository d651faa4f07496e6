//! Storage abstraction for blob bytes and their sideband metadata.
//!
//! The trait keeps the door open for non-filesystem backends (SQL, KV,
//! object stores); the rest of the system only depends on the contract
//! below.

mod filesystem;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

pub use filesystem::FilesystemStore;

/// Sideband metadata: `X-*` request headers captured at upload time and
/// echoed back as response headers on fetch.
pub type MetadataMap = HashMap<String, String>;

/// A backend that persists blobs by id.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `data` under `id`, plus the metadata map when it is
    /// non-empty. A metadata write failure is a store failure even though
    /// the bytes may already have landed.
    async fn store(&self, id: &str, data: Bytes, metadata: &MetadataMap) -> Result<()>;

    /// Bytes and metadata for `id`, or `None` if the blob does not exist.
    /// Missing or unreadable metadata is not an error; the blob is simply
    /// returned with an empty map.
    async fn get(&self, id: &str) -> Result<Option<(Bytes, MetadataMap)>>;

    /// Does a blob with this id exist?
    async fn exists(&self, id: &str) -> bool;

    /// All known blob ids.
    async fn existing(&self) -> Result<Vec<String>>;
}

/// Blob ids are restricted to `[a-z0-9]+`. This check is the defense
/// against path traversal, so it runs before any id reaches a store.
pub fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Lowercase hex SHA-1 of a request body; the API gateway uses it as the
/// blob id, which makes re-uploads of identical content idempotent.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
