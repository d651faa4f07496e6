//! The replication pass: copy every object known inside a group to every
//! other member of the same group, metadata included.
//!
//! Groups represent independent shards, so reconciliation never crosses a
//! group boundary. The pass is one-shot; it is triggered by the
//! `replicate` subcommand, not a daemon.

use crate::client::BlobClient;
use crate::registry::{BlobServer, ServerRegistry};
use crate::{Result, SosError};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Replicator {
    registry: Arc<ServerRegistry>,
    client: BlobClient,
}

impl Replicator {
    pub fn new(registry: Arc<ServerRegistry>, client: BlobClient) -> Self {
        Self { registry, client }
    }

    /// Run one reconciliation pass over every group.
    pub async fn run(&self) {
        for group in self.registry.groups() {
            tracing::info!(group = %group, "syncing group");
            self.sync_group(&self.registry.group_members(&group)).await;
        }
    }

    /// Bring the members of one group in sync: anything a member holds is
    /// mirrored to every peer that lacks it. Individual failures are
    /// logged and skipped; the next pass heals whatever this one missed.
    async fn sync_group(&self, members: &[BlobServer]) {
        let mut catalog: HashMap<&str, Vec<String>> = HashMap::new();
        for member in members {
            tracing::debug!(member = %member.location, "group member");
            let objects = match self.client.list_blobs(&member.location).await {
                Ok(objects) => objects,
                Err(error) => {
                    // Nothing replicates from this server this pass; its
                    // objects can still arrive from peers that hold them.
                    tracing::warn!(server = %member.location, %error, "object listing failed");
                    Vec::new()
                }
            };
            catalog.insert(member.location.as_str(), objects);
        }

        for src in members {
            for object in &catalog[src.location.as_str()] {
                for dst in members {
                    if dst.location == src.location {
                        continue;
                    }
                    if self.object_present(&dst.location, object).await {
                        continue;
                    }
                    if let Err(error) = self.mirror_object(src, dst, object).await {
                        tracing::warn!(
                            object = %object,
                            src = %src.location,
                            dst = %dst.location,
                            %error,
                            "mirror failed"
                        );
                    }
                }
            }
        }
    }

    /// Existence probes that fail count as missing; the worst case is a
    /// redundant mirror of a content-addressed object.
    async fn object_present(&self, location: &str, object: &str) -> bool {
        match self.client.has_blob(location, object).await {
            Ok(present) => present,
            Err(error) => {
                tracing::debug!(server = %location, object = %object, %error, "existence check failed");
                false
            }
        }
    }

    async fn mirror_object(&self, src: &BlobServer, dst: &BlobServer, object: &str) -> Result<()> {
        tracing::debug!(object = %object, src = %src.location, dst = %dst.location, "mirroring object");

        let payload = self.client.fetch_blob(&src.location, object).await?;
        if payload.status != StatusCode::OK {
            return Err(SosError::Http(format!(
                "source returned {} for {}",
                payload.status, object
            )));
        }

        let reply = self
            .client
            .store_blob(&dst.location, object, payload.body, &payload.headers)
            .await?;
        if reply.status != StatusCode::OK {
            return Err(SosError::Http(format!(
                "destination returned {}",
                reply.status
            )));
        }

        Ok(())
    }
}
