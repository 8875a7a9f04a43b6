//! Configuration management for the RMA tracker.
//!
//! Settings live in a TOML file under the data directory. The extraction
//! credential is normally supplied through the environment (`GEMINI_API_KEY`,
//! loadable from `.env`) rather than written to disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::ExtractionConfig;
use crate::imaging::{CameraConfig, ImagingConfig};

pub const CONFIG_FILE: &str = "rmatrack.toml";
pub const RECORDS_FILE: &str = "records.json";

/// Environment variable that overrides the configured API credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub imaging: ImagingConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

impl Settings {
    /// Load settings from the data directory, falling back to defaults when
    /// no config file exists yet. The env credential always wins.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut settings = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            debug!("No config file at {}; using defaults", path.display());
            Settings::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                settings.extraction.api_key = key;
            }
        }
        Ok(settings)
    }

    /// Write settings to the data directory, creating it if needed.
    ///
    /// The credential is never persisted; a key picked up from the
    /// environment stays in the environment.
    pub fn save(&self, data_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let mut on_disk = self.clone();
        on_disk.extraction.api_key = String::new();
        let contents = toml::to_string_pretty(&on_disk)?;
        std::fs::write(data_dir.join(CONFIG_FILE), contents)?;
        Ok(())
    }

    pub fn records_path(data_dir: &Path) -> PathBuf {
        data_dir.join(RECORDS_FILE)
    }
}

/// Platform default data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("rmatrack"))
        .unwrap_or_else(|| PathBuf::from(".rmatrack"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FallbackPolicy;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(
            settings.extraction.policy,
            FallbackPolicy::SimulateOnMissingCredential
        );
        assert_eq!(settings.imaging.photo.max_edge, 800);
        assert_eq!(settings.imaging.label.max_edge, 1600);
    }

    #[test]
    fn test_save_load_roundtrip_does_not_persist_credential() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.extraction.api_key = "should-not-persist".to_string();
        settings.imaging.photo.max_edge = 640;
        settings.save(dir.path()).unwrap();

        let written = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(!written.contains("should-not-persist"));

        let loaded = Settings::load(dir.path()).unwrap();
        assert_eq!(loaded.imaging.photo.max_edge, 640);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.imaging.label.quality, 90);
    }
}
