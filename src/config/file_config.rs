use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub blob_root: Option<String>,
    pub bucket: Option<String>,
    pub source_key: Option<String>,
    pub catalog_table: Option<String>,
    pub fetch_timeout_sec: Option<u64>,

    pub provisioning: Option<ProvisioningConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub poll_interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
db_path = "/data/catalog.db"
blob_root = "/data/blobs"
bucket = "media"
source_key = "a2.json"
catalog_table = "songs"
fetch_timeout_sec = 10

[provisioning]
poll_interval_ms = 250
max_attempts = 5
timeout_secs = 30
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_path, Some("/data/catalog.db".to_string()));
        assert_eq!(config.blob_root, Some("/data/blobs".to_string()));
        assert_eq!(config.bucket, Some("media".to_string()));
        assert_eq!(config.source_key, Some("a2.json".to_string()));
        assert_eq!(config.catalog_table, Some("songs".to_string()));
        assert_eq!(config.fetch_timeout_sec, Some(10));
        let provisioning = config.provisioning.unwrap();
        assert_eq!(provisioning.poll_interval_ms, Some(250));
        assert_eq!(provisioning.max_attempts, Some(5));
        assert_eq!(provisioning.timeout_secs, Some(30));
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bucket = \"media\"").unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.bucket, Some("media".to_string()));
        assert!(config.db_path.is_none());
        assert!(config.provisioning.is_none());
    }

    #[test]
    fn test_load_invalid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "fetch_timeout_sec = \"soon\"").unwrap();
        assert!(FileConfig::load(file.path()).is_err());

        assert!(FileConfig::load(Path::new("/nonexistent/config.toml")).is_err());
    }
}
