//! Retrieval of remote media referenced by the catalog.

mod client;

pub use client::HttpMediaFetcher;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Downloads the bytes behind `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Serves canned responses. URLs without a response fail.
#[derive(Default)]
pub struct MemoryMediaFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: &str, data: &[u8]) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_owned(), data.to_vec());
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MemoryMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_owned());
        match self.responses.lock().unwrap().get(url) {
            Some(data) => Ok(data.clone()),
            None => bail!("No response for {}", url),
        }
    }
}
