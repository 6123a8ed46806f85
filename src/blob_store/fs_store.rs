use super::{validate_location, BlobStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Blob store laid out as `<root>/<bucket>/<key>` on the local filesystem.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        FsBlobStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_location(bucket, key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read blob {:?}", path)),
        }
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.blob_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        debug!("Writing {} bytes to {:?}", data.len(), path);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write blob {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        store
            .put("catalog", "images/a.jpg", b"jpeg".to_vec())
            .await
            .unwrap();
        assert!(temp_dir.path().join("catalog/images/a.jpg").is_file());

        let data = store.get("catalog", "images/a.jpg").await.unwrap();
        assert_eq!(data, Some(b"jpeg".to_vec()));

        store
            .put("catalog", "images/a.jpg", b"png".to_vec())
            .await
            .unwrap();
        let data = store.get("catalog", "images/a.jpg").await.unwrap();
        assert_eq!(data, Some(b"png".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_blob_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());
        assert_eq!(store.get("catalog", "songs.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().join("root"));
        assert!(store
            .put("catalog", "../outside", b"x".to_vec())
            .await
            .is_err());
        assert!(store.get("..", "songs.json").await.is_err());
    }
}
