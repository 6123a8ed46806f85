//! Test fixture creation for the service and its backends

use super::constants::*;
use music_catalog_service::blob_store::{BlobStore, FsBlobStore};
use music_catalog_service::catalog::ImporterSettings;
use music_catalog_service::fetcher::MemoryMediaFetcher;
use music_catalog_service::kv_store::{ProvisioningPolicy, SqliteKvStore};
use music_catalog_service::{CatalogService, Clients};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A started service backed by SQLite and the filesystem in a temp dir.
pub struct TestService {
    pub service: CatalogService,
    pub kv: Arc<SqliteKvStore>,
    pub blobs: Arc<FsBlobStore>,
    pub fetcher: Arc<MemoryMediaFetcher>,
    pub cancel: CancellationToken,
    pub db_path: PathBuf,
    _temp_dir: TempDir,
}

pub fn test_settings() -> ImporterSettings {
    ImporterSettings {
        bucket: BUCKET.to_string(),
        source_key: SOURCE_KEY.to_string(),
        table: CATALOG_TABLE.to_string(),
        provisioning: ProvisioningPolicy {
            poll_interval: Duration::from_millis(5),
            max_attempts: 20,
            timeout: Duration::from_secs(5),
        },
    }
}

/// Serves the test image for every song of `SOURCE_DOCUMENT`.
pub fn test_fetcher() -> MemoryMediaFetcher {
    ["a", "b", "c"]
        .iter()
        .fold(MemoryMediaFetcher::new(), |fetcher, name| {
            fetcher.with_response(
                &format!("https://images.example.com/covers/{}.jpg", name),
                TEST_IMAGE_BYTES,
            )
        })
}

impl TestService {
    /// Spawns a service with `source` uploaded as the source document.
    pub async fn spawn_with(source: Option<&str>, fetcher: MemoryMediaFetcher) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("catalog.db");

        let kv = Arc::new(SqliteKvStore::new(&db_path).expect("Failed to open kv store"));
        let blobs = Arc::new(FsBlobStore::new(temp_dir.path().join("blobs")));
        let fetcher = Arc::new(fetcher);
        if let Some(source) = source {
            blobs
                .put(BUCKET, SOURCE_KEY, source.as_bytes().to_vec())
                .await
                .expect("Failed to upload source document");
        }

        let cancel = CancellationToken::new();
        let clients = Clients {
            kv: kv.clone(),
            blobs: blobs.clone(),
            fetcher: fetcher.clone(),
        };
        let service = CatalogService::new(clients, test_settings(), cancel.clone());
        service.start().await.expect("Failed to start service");

        Self {
            service,
            kv,
            blobs,
            fetcher,
            cancel,
            db_path,
            _temp_dir: temp_dir,
        }
    }

    pub async fn spawn() -> Self {
        Self::spawn_with(Some(SOURCE_DOCUMENT), test_fetcher()).await
    }

    /// Spawns a service and runs a successful sync.
    pub async fn synced() -> Self {
        let test_service = Self::spawn().await;
        let outcome = test_service.service.sync_catalog().await;
        assert!(outcome.succeeded(), "initial sync failed: {:?}", outcome);
        test_service
    }

    /// Spawns a synced service with the test user registered.
    pub async fn with_user() -> Self {
        let test_service = Self::synced().await;
        assert!(test_service
            .service
            .register_user(TEST_EMAIL, TEST_USERNAME, TEST_PASS)
            .is_registered());
        test_service
    }
}
