use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::AppConfig;
use crate::error::{AppError, Result};

/// Configuration store backed by a JSON file
///
/// Uses `ArcSwap` for lock-free reads, so the hot path can read
/// configuration without contending with writers.
#[derive(Clone)]
pub struct ConfigStore {
    cache: Arc<ArcSwap<AppConfig>>,
}

impl ConfigStore {
    /// Open the store, creating the file with defaults if missing
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let config = Self::load_config(path).await?;
        Ok(Self {
            cache: Arc::new(ArcSwap::from_pointee(config)),
        })
    }

    async fn load_config(path: &Path) -> Result<AppConfig> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let config: AppConfig = serde_json::from_str(&json)
                    .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating default configuration at {}", path.display());
                let config = AppConfig::default();
                Self::save_config_to_file(path, &config).await?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_config_to_file(path: &Path, config: &AppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Get current configuration (lock-free)
    pub fn get(&self) -> Arc<AppConfig> {
        self.cache.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("teleop.json");

        let store = ConfigStore::new(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(*store.get(), AppConfig::default());

        // defaults written to disk parse back unchanged
        let written: AppConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, AppConfig::default());

        let mut edited = written;
        edited.control.tick_ms = 20;
        edited.encoder.max_gear = 3;
        std::fs::write(&path, serde_json::to_string(&edited).unwrap()).unwrap();

        let store2 = ConfigStore::new(&path).await.unwrap();
        assert_eq!(store2.get().control.tick_ms, 20);
        assert_eq!(store2.get().encoder.max_gear, 3);
    }

    #[tokio::test]
    async fn test_out_of_range_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.json");
        std::fs::write(&path, r#"{"control":{"tick_ms":0}}"#).unwrap();
        let err = ConfigStore::new(&path).await.err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = ConfigStore::new(&path).await.err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}
