//! Configuration module

use crate::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to an archive path to name its extraction folder
pub const DEFAULT_SUFFIX: &str = "-extracted";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Extraction settings
    #[serde(default)]
    pub extract: ExtractConfig,
    /// Worker pool settings
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Extraction configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Extract archives found inside extracted archives
    pub recursive: bool,
    /// Suffix for extraction folders
    pub suffix: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Threads enumerating archives (0 = auto)
    pub archive_workers: usize,
    /// Threads extracting entries (0 = auto)
    pub file_workers: usize,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir().ok_or_else(|| {
            Error::Config("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join("dredge").join("config.toml"))
    }

    /// Get default configuration content with comments
    pub fn default_config_content() -> String {
        r#"# Dredge Configuration File

[extract]
# Also extract archives found inside extracted archives
recursive = false
# Appended to an archive's path to name the folder it is extracted into
suffix = "-extracted"

[performance]
# Threads enumerating archives (0 = one per CPU)
archive_workers = 0
# Threads extracting entries (0 = one per CPU)
file_workers = 0
"#
        .to_string()
    }

    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&path, contents)?;
        Ok(())
    }

    /// Load configuration or use defaults if loading fails
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Check values that would make a run impossible
    pub fn validate(&self) -> Result<()> {
        validate_suffix(&self.extract.suffix)
    }
}

/// An empty suffix would make the extraction folder the archive itself,
/// and a separator would place it somewhere other than next to it.
pub(crate) fn validate_suffix(suffix: &str) -> Result<()> {
    if suffix.is_empty() {
        return Err(Error::Config("Extraction suffix must not be empty".to_string()));
    }
    if suffix.contains('/') || suffix.contains(std::path::MAIN_SEPARATOR) {
        return Err(Error::Config(format!(
            "Extraction suffix must not contain a path separator: {:?}",
            suffix
        )));
    }
    Ok(())
}
