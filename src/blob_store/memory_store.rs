use super::{validate_location, BlobStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys stored in the bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let blobs = self.blobs.lock().unwrap();
        let mut keys: Vec<String> = blobs
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        validate_location(bucket, key)?;
        let blobs = self.blobs.lock().unwrap();
        Ok(blobs.get(&(bucket.to_owned(), key.to_owned())).cloned())
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        validate_location(bucket, key)?;
        let mut blobs = self.blobs.lock().unwrap();
        blobs.insert((bucket.to_owned(), key.to_owned()), data);
        Ok(())
    }
}
