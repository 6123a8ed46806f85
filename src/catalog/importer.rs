//! Full-replace synchronization of the catalog table from the source
//! document, mirroring cover images into blob storage.
//!
//! A run loads the source document, provisions the table if needed, deletes
//! every existing item and reloads the songs one at a time. The first error
//! ends the run; nothing is rolled back, running again is the recovery path.

use super::models::{CatalogDocument, CatalogItem, SourceSong};
use super::schema::{catalog_table_schema, IMAGES_PREFIX};
use crate::blob_store::BlobStore;
use crate::fetcher::MediaFetcher;
use crate::kv_store::{ensure_table, KeyValueStore, ProvisioningPolicy, TableSchema};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Clone, Debug)]
pub struct ImporterSettings {
    pub bucket: String,
    pub source_key: String,
    pub table: String,
    pub provisioning: ProvisioningPolicy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub deleted: usize,
    pub loaded: usize,
    pub images_mirrored: usize,
    pub image_bytes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    LoadSource,
    Provision,
    Clear,
    Reload,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::LoadSource => "load source",
            SyncStage::Provision => "provision",
            SyncStage::Clear => "clear",
            SyncStage::Reload => "reload",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The source document has no `songs`; nothing was touched.
    NoSourceData,
    Synced { stats: ImportStats },
    /// `stats` holds the progress made before the failure.
    Failed {
        stage: SyncStage,
        error: String,
        stats: ImportStats,
    },
}

impl SyncOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, SyncOutcome::Failed { .. })
    }
}

struct StageError {
    stage: SyncStage,
    error: anyhow::Error,
}

trait AtStage<T> {
    fn at_stage(self, stage: SyncStage) -> Result<T, StageError>;
}

impl<T, E: Into<anyhow::Error>> AtStage<T> for Result<T, E> {
    fn at_stage(self, stage: SyncStage) -> Result<T, StageError> {
        self.map_err(|err| StageError {
            stage,
            error: err.into(),
        })
    }
}

pub struct CatalogImporter {
    kv: Arc<dyn KeyValueStore>,
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn MediaFetcher>,
    settings: ImporterSettings,
}

impl CatalogImporter {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn MediaFetcher>,
        settings: ImporterSettings,
    ) -> Self {
        CatalogImporter {
            kv,
            blobs,
            fetcher,
            settings,
        }
    }

    /// Runs one synchronization. Never returns an error; failures are
    /// reported through the outcome and logged.
    pub async fn sync(&self, cancel: &CancellationToken) -> SyncOutcome {
        let mut stats = ImportStats::default();
        let outcome = match self.run(cancel, &mut stats).await {
            Ok(true) => SyncOutcome::Synced { stats },
            Ok(false) => SyncOutcome::NoSourceData,
            Err(StageError { stage, error }) => {
                error!("Catalog sync failed during {}: {:#}", stage, error);
                SyncOutcome::Failed {
                    stage,
                    error: format!("{:#}", error),
                    stats,
                }
            }
        };

        match &outcome {
            SyncOutcome::NoSourceData => warn!(
                "Source document {}/{} has no songs, catalog left untouched",
                self.settings.bucket, self.settings.source_key
            ),
            SyncOutcome::Synced { .. } | SyncOutcome::Failed { .. } => {
                info!("Sync Summary");
                info!("Items deleted: {}", stats.deleted);
                info!("Items loaded: {}", stats.loaded);
                info!(
                    "Images mirrored: {} ({} bytes)",
                    stats.images_mirrored, stats.image_bytes
                );
            }
        }
        outcome
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        stats: &mut ImportStats,
    ) -> Result<bool, StageError> {
        let songs = match self.load_source().await.at_stage(SyncStage::LoadSource)? {
            Some(songs) => songs,
            None => return Ok(false),
        };
        info!("Source document lists {} songs", songs.len());

        let schema = catalog_table_schema(&self.settings.table);
        ensure_table(
            self.kv.as_ref(),
            &schema,
            &self.settings.provisioning,
            cancel,
        )
        .await
        .at_stage(SyncStage::Provision)?;

        self.clear(&schema, cancel, stats).at_stage(SyncStage::Clear)?;
        self.reload(&songs, cancel, stats)
            .await
            .at_stage(SyncStage::Reload)?;
        Ok(true)
    }

    async fn load_source(&self) -> Result<Option<Vec<SourceSong>>> {
        let data = self
            .blobs
            .get(&self.settings.bucket, &self.settings.source_key)
            .await?
            .with_context(|| {
                format!(
                    "Source document {}/{} not found",
                    self.settings.bucket, self.settings.source_key
                )
            })?;
        Ok(CatalogDocument::parse(&data)?.songs)
    }

    fn clear(
        &self,
        schema: &TableSchema,
        cancel: &CancellationToken,
        stats: &mut ImportStats,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            bail!("Cancelled before clearing the catalog");
        }
        let existing = self.kv.scan(&schema.name, &[])?;
        info!("Deleting {} existing catalog items", existing.len());
        for item in &existing {
            if cancel.is_cancelled() {
                bail!(
                    "Cancelled after deleting {} of {} items",
                    stats.deleted,
                    existing.len()
                );
            }
            let key = schema.primary_key_of(item)?;
            self.kv.delete(&schema.name, &key)?;
            stats.deleted += 1;
        }
        Ok(())
    }

    async fn reload(
        &self,
        songs: &[SourceSong],
        cancel: &CancellationToken,
        stats: &mut ImportStats,
    ) -> Result<()> {
        for song in songs {
            if cancel.is_cancelled() {
                bail!("Cancelled after loading {} of {} songs", stats.loaded, songs.len());
            }

            let catalog_item = CatalogItem::from_source(song);
            info!("Loading {} by {}", catalog_item.title, catalog_item.artist);
            self.kv
                .put(&self.settings.table, catalog_item.to_item())
                .with_context(|| format!("Failed to store {}", catalog_item.title))?;
            stats.loaded += 1;

            let image = self
                .fetcher
                .fetch(&song.img_url)
                .await
                .with_context(|| format!("Failed to download image of {}", catalog_item.title))?;
            let image_len = image.len() as u64;
            self.blobs
                .put(
                    &self.settings.bucket,
                    &format!("{}{}", IMAGES_PREFIX, catalog_item.img_url),
                    image,
                )
                .await?;
            stats.images_mirrored += 1;
            stats.image_bytes += image_len;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::MemoryBlobStore;
    use crate::catalog::{CatalogQuery, QueryRouter};
    use crate::fetcher::MemoryMediaFetcher;
    use crate::kv_store::{BillingMode, MemoryKvStore};
    use std::time::Duration;

    const SOURCE: &str = r#"{"songs": [
        {"title": "Song A", "artist": "Artist X", "year": "1999", "web_url": "https://w/a", "img_url": "https://img.host/covers/a.jpg"},
        {"title": "Song B", "artist": "Artist Y", "year": "2005", "web_url": "https://w/b", "img_url": "https://img.host/covers/b.jpg"}
    ]}"#;

    struct Fixture {
        kv: Arc<MemoryKvStore>,
        blobs: Arc<MemoryBlobStore>,
        fetcher: Arc<MemoryMediaFetcher>,
        importer: CatalogImporter,
    }

    fn settings() -> ImporterSettings {
        ImporterSettings {
            bucket: "catalog".to_string(),
            source_key: "songs.json".to_string(),
            table: "music".to_string(),
            provisioning: ProvisioningPolicy {
                poll_interval: Duration::from_millis(1),
                max_attempts: 20,
                timeout: Duration::from_secs(5),
            },
        }
    }

    async fn fixture_with(kv: MemoryKvStore, fetcher: MemoryMediaFetcher, source: &str) -> Fixture {
        let kv = Arc::new(kv);
        let blobs = Arc::new(MemoryBlobStore::new());
        let fetcher = Arc::new(fetcher);
        blobs
            .put("catalog", "songs.json", source.as_bytes().to_vec())
            .await
            .unwrap();
        let importer =
            CatalogImporter::new(kv.clone(), blobs.clone(), fetcher.clone(), settings());
        Fixture {
            kv,
            blobs,
            fetcher,
            importer,
        }
    }

    fn all_images_fetcher() -> MemoryMediaFetcher {
        MemoryMediaFetcher::new()
            .with_response("https://img.host/covers/a.jpg", b"aaaa")
            .with_response("https://img.host/covers/b.jpg", b"bb")
    }

    fn catalog(fixture: &Fixture) -> Vec<CatalogItem> {
        QueryRouter::new(fixture.kv.clone(), "music")
            .find(&CatalogQuery::default())
            .unwrap()
    }

    #[tokio::test]
    async fn sync_loads_items_and_mirrors_images() {
        let fixture = fixture_with(
            MemoryKvStore::new().with_activation_polls(2),
            all_images_fetcher(),
            SOURCE,
        )
        .await;

        let outcome = fixture.importer.sync(&CancellationToken::new()).await;
        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                stats: ImportStats {
                    deleted: 0,
                    loaded: 2,
                    images_mirrored: 2,
                    image_bytes: 6,
                }
            }
        );
        assert!(outcome.succeeded());

        let items = catalog(&fixture);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].img_url, "a.jpg");
        assert_eq!(items[0].year, 1999);

        assert_eq!(
            fixture.blobs.keys("catalog"),
            vec!["images/a.jpg", "images/b.jpg", "songs.json"]
        );
        let description = fixture.kv.describe_table("music").unwrap().unwrap();
        assert_eq!(description.billing_mode, BillingMode::OnDemand);
    }

    #[tokio::test]
    async fn second_sync_replaces_catalog_with_identical_content() {
        let fixture = fixture_with(MemoryKvStore::new(), all_images_fetcher(), SOURCE).await;
        let cancel = CancellationToken::new();

        assert!(fixture.importer.sync(&cancel).await.succeeded());
        let first = catalog(&fixture);

        let outcome = fixture.importer.sync(&cancel).await;
        assert!(matches!(
            outcome,
            SyncOutcome::Synced { stats } if stats.deleted == 2 && stats.loaded == 2
        ));
        assert_eq!(catalog(&fixture), first);
    }

    #[tokio::test]
    async fn stale_items_are_removed() {
        let fixture = fixture_with(MemoryKvStore::new(), all_images_fetcher(), SOURCE).await;
        fixture
            .kv
            .create_table(&catalog_table_schema("music"))
            .unwrap();
        let stale = CatalogItem {
            title: "Old".to_string(),
            artist: "Gone".to_string(),
            year: 1970,
            web_url: "w".to_string(),
            img_url: "old.jpg".to_string(),
        };
        fixture.kv.put("music", stale.to_item()).unwrap();

        let outcome = fixture.importer.sync(&CancellationToken::new()).await;
        assert!(outcome.succeeded());
        assert!(!catalog(&fixture).contains(&stale));
    }

    #[tokio::test]
    async fn missing_songs_leaves_store_untouched() {
        let fixture =
            fixture_with(MemoryKvStore::new(), all_images_fetcher(), r#"{"albums": []}"#).await;

        let outcome = fixture.importer.sync(&CancellationToken::new()).await;
        assert_eq!(outcome, SyncOutcome::NoSourceData);
        assert!(outcome.succeeded());
        assert!(!fixture.kv.table_exists("music").unwrap());
        assert!(fixture.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_source_document_fails() {
        let kv = Arc::new(MemoryKvStore::new());
        let importer = CatalogImporter::new(
            kv,
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryMediaFetcher::new()),
            settings(),
        );

        let outcome = importer.sync(&CancellationToken::new()).await;
        assert!(matches!(
            outcome,
            SyncOutcome::Failed { stage: SyncStage::LoadSource, ref error, .. } if error.contains("not found")
        ));
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn failed_image_fetch_aborts_with_partial_stats() {
        let fetcher =
            MemoryMediaFetcher::new().with_response("https://img.host/covers/a.jpg", b"aaaa");
        let fixture = fixture_with(MemoryKvStore::new(), fetcher, SOURCE).await;

        let outcome = fixture.importer.sync(&CancellationToken::new()).await;
        match outcome {
            SyncOutcome::Failed {
                stage,
                error,
                stats,
            } => {
                assert_eq!(stage, SyncStage::Reload);
                assert!(error.contains("Song B"));
                assert_eq!(stats.loaded, 2);
                assert_eq!(stats.images_mirrored, 1);
                assert_eq!(stats.image_bytes, 4);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // The item written before the failed fetch stays.
        assert_eq!(catalog(&fixture).len(), 2);
    }

    #[tokio::test]
    async fn provisioning_exhaustion_fails_the_run() {
        let fixture = fixture_with(
            MemoryKvStore::new().with_activation_polls(1000),
            all_images_fetcher(),
            SOURCE,
        )
        .await;

        let outcome = fixture.importer.sync(&CancellationToken::new()).await;
        match outcome {
            SyncOutcome::Failed { stage, error, .. } => {
                assert_eq!(stage, SyncStage::Provision);
                assert!(error.contains("20 attempts"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(fixture.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_keeps_existing_catalog() {
        let fixture = fixture_with(MemoryKvStore::new(), all_images_fetcher(), SOURCE).await;
        assert!(fixture
            .importer
            .sync(&CancellationToken::new())
            .await
            .succeeded());
        let requests_before = fixture.fetcher.requests().len();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = fixture.importer.sync(&cancel).await;
        assert_eq!(
            outcome,
            SyncOutcome::Failed {
                stage: SyncStage::Clear,
                error: "Cancelled before clearing the catalog".to_string(),
                stats: ImportStats::default(),
            }
        );
        assert_eq!(catalog(&fixture).len(), 2);
        assert_eq!(fixture.fetcher.requests().len(), requests_before);
    }
}
