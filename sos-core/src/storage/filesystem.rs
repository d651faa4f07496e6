use super::{BlobStore, MetadataMap};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Filesystem-backed store. Each blob is a file named after its id, with an
/// optional `{id}.json` sidecar holding the metadata map. The `.json`
/// suffix is reserved: sidecars are never enumerated as blobs.
///
/// Ids have been validated against `[a-z0-9]+` before they get here, so
/// joining them onto the prefix cannot escape the storage directory.
pub struct FilesystemStore {
    prefix: PathBuf,
}

impl FilesystemStore {
    /// Bind to a storage directory, creating it if missing.
    pub fn new(prefix: impl Into<PathBuf>) -> Result<Self> {
        let prefix = prefix.into();
        std::fs::create_dir_all(&prefix)?;
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.prefix.join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.prefix.join(format!("{}.json", id))
    }

    async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o644);

        let mut file = options.open(path).await?;
        file.write_all(data).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemStore {
    async fn store(&self, id: &str, data: Bytes, metadata: &MetadataMap) -> Result<()> {
        Self::write_file(&self.blob_path(id), &data).await?;

        if !metadata.is_empty() {
            let encoded = serde_json::to_vec(metadata)?;
            Self::write_file(&self.meta_path(id), &encoded).await?;
        }

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<(Bytes, MetadataMap)>> {
        let data = match fs::read(self.blob_path(id)).await {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let mut metadata = MetadataMap::new();
        if let Ok(raw) = fs::read(self.meta_path(id)).await {
            if let Ok(parsed) = serde_json::from_slice::<MetadataMap>(&raw) {
                metadata = parsed;
            }
        }

        Ok(Some((Bytes::from(data), metadata)))
    }

    async fn exists(&self, id: &str) -> bool {
        fs::metadata(self.blob_path(id)).await.is_ok()
    }

    async fn existing(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.prefix).await?;
        let mut list = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                continue;
            }
            list.push(name);
        }

        list.sort();
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FilesystemStore {
        FilesystemStore::new(dir.path()).unwrap()
    }

    #[tokio::test]
    async fn empty_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.existing().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_tracks_created_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        // Ids are what the handlers enforce; the storage layer itself lists
        // whatever file names it finds.
        let files = ["steve", "test'", "foo"];
        for name in files {
            assert!(!store.exists(name).await);
            std::fs::write(dir.path().join(name), b"File Content Here").unwrap();
            assert!(store.exists(name).await);
        }

        let list = store.existing().await.unwrap();
        assert_eq!(list.len(), files.len());
    }

    #[tokio::test]
    async fn sidecars_are_excluded_from_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        std::fs::write(dir.path().join("steve"), b"Content").unwrap();
        assert_eq!(store.existing().await.unwrap(), vec!["steve"]);

        std::fs::write(dir.path().join("steve.json"), b"{}").unwrap();
        assert_eq!(store.existing().await.unwrap(), vec!["steve"]);
    }

    #[tokio::test]
    async fn get_returns_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        for id in ["steve", "foo"] {
            std::fs::write(dir.path().join(id), id.as_bytes()).unwrap();
        }

        for id in ["steve", "foo"] {
            let (data, metadata) = store.get(id).await.unwrap().unwrap();
            assert_eq!(data, Bytes::from(id.as_bytes()));
            assert!(metadata.is_empty());
        }

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut metadata = MetadataMap::new();
        metadata.insert("x-file-name".to_string(), "steve".to_string());

        store
            .store("steve", Bytes::from_static(b"steve"), &metadata)
            .await
            .unwrap();
        assert!(store.exists("steve").await);

        let (data, read_back) = store.get("steve").await.unwrap().unwrap();
        assert_eq!(data, Bytes::from_static(b"steve"));
        assert_eq!(read_back.get("x-file-name").map(String::as_str), Some("steve"));
    }

    #[tokio::test]
    async fn empty_metadata_writes_no_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .store("steve", Bytes::from_static(b"Content"), &MetadataMap::new())
            .await
            .unwrap();

        assert!(!dir.path().join("steve.json").exists());
    }

    #[tokio::test]
    async fn malformed_sidecar_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        std::fs::write(dir.path().join("steve"), b"Content").unwrap();
        std::fs::write(dir.path().join("steve.json"), b"not json at all").unwrap();

        let (data, metadata) = store.get("steve").await.unwrap().unwrap();
        assert_eq!(data, Bytes::from_static(b"Content"));
        assert!(metadata.is_empty());
    }

    #[tokio::test]
    async fn restore_overwrites_data_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut first = MetadataMap::new();
        first.insert("x-file-name".to_string(), "one".to_string());
        store
            .store("steve", Bytes::from_static(b"one"), &first)
            .await
            .unwrap();

        let mut second = MetadataMap::new();
        second.insert("x-file-name".to_string(), "two".to_string());
        store
            .store("steve", Bytes::from_static(b"two"), &second)
            .await
            .unwrap();

        let (data, metadata) = store.get("steve").await.unwrap().unwrap();
        assert_eq!(data, Bytes::from_static(b"two"));
        assert_eq!(metadata.get("x-file-name").map(String::as_str), Some("two"));
    }
}
