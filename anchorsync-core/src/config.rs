//! Coordinator configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.anchorsync/
//!   config.yaml     (optional, defaults apply when absent)
//!   data/
//!     <key>.bin     (blobs written by FileBlobStore)
//! ```
//!
//! Like the rest of the crate, every loader has an explicit-home `_at` form
//! used by tests and a convenience wrapper that asks `dirs::home_dir()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::types::SessionSetting;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAP_KEY: &str = "worldmap";
pub const DEFAULT_RECORDS_KEY: &str = "cloud-anchors";

/// Tunables for a coordinator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Upper bound between progress checks in `wait_until_all_resolved`.
    pub poll_interval_ms: u64,
    /// Anchor names that survive a load (focus indicators and the like).
    pub protected_anchors: Vec<String>,
    /// Blob key for the persisted local map.
    pub map_key: String,
    /// Blob key for hosted cloud-anchor records.
    pub records_key: String,
    /// Features applied whenever the session is (re)configured.
    pub settings: Vec<SessionSetting>,
    pub debug: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            protected_anchors: vec!["focus-box".to_string(), "focus-indicator".to_string()],
            map_key: DEFAULT_MAP_KEY.to_string(),
            records_key: DEFAULT_RECORDS_KEY.to_string(),
            settings: vec![SessionSetting::PlaneDetection],
            debug: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn is_protected(&self, anchor_name: Option<&str>) -> bool {
        anchor_name
            .map(|name| self.protected_anchors.iter().any(|p| p == name))
            .unwrap_or(false)
    }
}

/// `<home>/.anchorsync`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".anchorsync")
}

/// `<home>/.anchorsync/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

/// `<home>/.anchorsync/data`
pub fn data_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("data")
}

/// Load the config under `home`, falling back to defaults when absent.
pub fn load_at(home: &Path) -> Result<CoordinatorConfig, StoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(CoordinatorConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<CoordinatorConfig, StoreError> {
    load_at(&home()?)
}

/// Atomically write `config` to `<home>/.anchorsync/config.yaml`.
pub fn save_at(home: &Path, config: &CoordinatorConfig) -> Result<(), StoreError> {
    let path = config_path_at(home);
    let dir = root_at(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}
