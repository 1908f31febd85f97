//! Viewer configuration.
//!
//! Read from `$SCENARIO_EXPLORER_CONFIG`, else `explorer.yaml` in the
//! working directory. Every field has a default, so partial files work and
//! a missing file means "all defaults".

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::cache::DatasetCache;

pub const CONFIG_ENV_VAR: &str = "SCENARIO_EXPLORER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "explorer.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Directory holding the versioned dataset files.
    pub data_dir: PathBuf,

    /// Directory holding the metadata YAML files (defaults to `data_dir`).
    pub metadata_dir: Option<PathBuf>,

    /// Version selected at start-up (defaults to the first available one).
    pub default_version: Option<String>,

    /// How long a loaded dataset stays cached.
    pub cache_ttl_secs: u64,

    /// Maximum number of dataset versions held at once.
    pub cache_capacity: u64,

    /// Regions selected when a sector is first shown.
    pub default_regions: Vec<String>,

    /// Sectors listed first in the sector selector, in this order.
    pub priority_sectors: Vec<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            metadata_dir: None,
            default_version: None,
            cache_ttl_secs: DatasetCache::DEFAULT_TTL.as_secs(),
            cache_capacity: DatasetCache::DEFAULT_CAPACITY,
            default_regions: vec!["World".to_string()],
            priority_sectors: [
                "Global mean surface temperature increase",
                "Carbon dioxide emissions",
                "Population",
                "Gross domestic product",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ExplorerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
    }

    /// Config from the environment variable path, else the default file if
    /// it exists, else defaults.
    pub fn discover() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            Self::from_file(fallback)
        } else {
            Ok(Self::default())
        }
    }

    pub fn metadata_dir(&self) -> &Path {
        self.metadata_dir.as_deref().unwrap_or(self.data_dir.as_path())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
