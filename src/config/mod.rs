mod file_config;

pub use file_config::{FileConfig, ProvisioningConfig};

use crate::catalog::{catalog_table_schema, ImporterSettings};
use crate::kv_store::ProvisioningPolicy;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BUCKET: &str = "catalog";
pub const DEFAULT_SOURCE_KEY: &str = "songs.json";
pub const DEFAULT_CATALOG_TABLE: &str = "music";
pub const DEFAULT_FETCH_TIMEOUT_SEC: u64 = 30;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub blob_root: Option<PathBuf>,
    pub bucket: String,
    pub source_key: String,
    pub catalog_table: String,
    pub fetch_timeout_sec: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            blob_root: None,
            bucket: DEFAULT_BUCKET.to_string(),
            source_key: DEFAULT_SOURCE_KEY.to_string(),
            catalog_table: DEFAULT_CATALOG_TABLE.to_string(),
            fetch_timeout_sec: DEFAULT_FETCH_TIMEOUT_SEC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub blob_root: PathBuf,
    pub bucket: String,
    pub source_key: String,
    pub catalog_table: String,
    pub fetch_timeout_sec: u64,
    pub provisioning: ProvisioningPolicy,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        let db_dir = match db_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !db_dir.is_dir() {
            bail!("db_path directory does not exist: {:?}", db_dir);
        }

        // Blobs live next to the database unless configured otherwise
        let blob_root = file
            .blob_root
            .map(PathBuf::from)
            .or_else(|| cli.blob_root.clone())
            .unwrap_or(db_dir);

        let bucket = file.bucket.unwrap_or_else(|| cli.bucket.clone());
        if bucket.is_empty() || bucket.contains('/') {
            bail!("bucket must be a non-empty name without '/': {:?}", bucket);
        }

        let source_key = file.source_key.unwrap_or_else(|| cli.source_key.clone());
        if source_key.is_empty() {
            bail!("source_key must not be empty");
        }

        let catalog_table = file
            .catalog_table
            .unwrap_or_else(|| cli.catalog_table.clone());
        if catalog_table_schema(&catalog_table).validate().is_err() {
            bail!("catalog_table is not a valid table name: {:?}", catalog_table);
        }

        let fetch_timeout_sec = file.fetch_timeout_sec.unwrap_or(cli.fetch_timeout_sec);
        if fetch_timeout_sec == 0 {
            bail!("fetch_timeout_sec must be greater than 0");
        }

        // Provisioning settings - merge file config with defaults
        let defaults = ProvisioningPolicy::default();
        let provisioning_file = file.provisioning.unwrap_or_default();
        let provisioning = ProvisioningPolicy {
            poll_interval: provisioning_file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_attempts: provisioning_file
                .max_attempts
                .unwrap_or(defaults.max_attempts),
            timeout: provisioning_file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };
        if provisioning.max_attempts == 0 {
            bail!("provisioning.max_attempts must be greater than 0");
        }

        Ok(Self {
            db_path,
            blob_root,
            bucket,
            source_key,
            catalog_table,
            fetch_timeout_sec,
            provisioning,
        })
    }

    pub fn importer_settings(&self) -> ImporterSettings {
        ImporterSettings {
            bucket: self.bucket.clone(),
            source_key: self.source_key.clone(),
            table: self.catalog_table.clone(),
            provisioning: self.provisioning.clone(),
        }
    }
}
