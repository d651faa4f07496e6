//! SOS Core - shared library for the simple object store
//!
//! A small content-addressed blob store:
//! - blobs are opaque byte sequences named by alphanumeric ids
//! - the API gateway addresses uploads by the SHA-1 of their content
//! - blob-servers are grouped; a replication pass reconciles each group

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod replicate;
pub mod storage;

pub use client::{BlobClient, BlobPayload};
pub use error::{Result, SosError};
pub use registry::{BlobServer, ServerRegistry};
pub use replicate::Replicator;
pub use storage::{compute_hash, valid_id, BlobStore, FilesystemStore, MetadataMap};
