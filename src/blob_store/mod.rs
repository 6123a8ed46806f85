//! Blob storage addressed by `(bucket, key)`.
//!
//! Holds the catalog source document and the mirrored media files.

mod fs_store;
mod memory_store;

pub use fs_store::FsBlobStore;
pub use memory_store::MemoryBlobStore;

use anyhow::{bail, Result};
use async_trait::async_trait;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the blob contents, or Ok(None) if nothing is stored at the key.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores the blob, replacing any previous contents.
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;
}

/// Rejects keys that could escape the bucket when mapped onto a filesystem.
fn validate_location(bucket: &str, key: &str) -> Result<()> {
    if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
        bail!("Invalid bucket name {:?}", bucket);
    }
    if key.is_empty()
        || key.starts_with('/')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        bail!("Invalid blob key {:?}", key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_validation() {
        assert!(validate_location("catalog", "songs.json").is_ok());
        assert!(validate_location("catalog", "images/a.jpg").is_ok());
        assert!(validate_location("", "songs.json").is_err());
        assert!(validate_location("a/b", "songs.json").is_err());
        assert!(validate_location("catalog", "../secret").is_err());
        assert!(validate_location("catalog", "/etc/passwd").is_err());
        assert!(validate_location("catalog", "images//a.jpg").is_err());
        assert!(validate_location("catalog", "").is_err());
    }
}
