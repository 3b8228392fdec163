//! Publisher configuration.
//!
//! Loaded from `landing-press.toml` in the working directory (or the path
//! given with `--config`). Every key is optional:
//!
//! ```toml
//! published_root = "published"   # One directory per landing page
//! records_file = "landings.json" # Record store
//!
//! [assets]
//! max_files = 7                  # Secondary files per upload
//! prefix = "anh"                 # anh1.jpg, anh2.png, ...
//! default_extension = "jpg"      # Used when an upload has no extension
//!
//! [paused]
//! title = "Paused"
//! message = "This landing page is temporarily paused."
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config filename, looked up relative to the working directory.
pub const CONFIG_FILENAME: &str = "landing-press.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PressConfig {
    /// Directory holding one subdirectory per publication.
    pub published_root: PathBuf,
    /// JSON file backing the record store.
    pub records_file: PathBuf,
    pub assets: AssetsConfig,
    pub paused: PausedConfig,
}

impl Default for PressConfig {
    fn default() -> Self {
        Self {
            published_root: PathBuf::from("published"),
            records_file: PathBuf::from("landings.json"),
            assets: AssetsConfig::default(),
            paused: PausedConfig::default(),
        }
    }
}

impl PressConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.published_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "published_root must not be empty".into(),
            ));
        }
        if !(1..=50).contains(&self.assets.max_files) {
            return Err(ConfigError::Validation(
                "assets.max_files must be 1-50".into(),
            ));
        }
        if self.assets.prefix.is_empty()
            || !self
                .assets
                .prefix
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ConfigError::Validation(
                "assets.prefix must be non-empty ASCII letters, digits, '-' or '_'".into(),
            ));
        }
        if self.assets.default_extension.is_empty()
            || !self
                .assets
                .default_extension
                .bytes()
                .all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Validation(
                "assets.default_extension must be non-empty ASCII alphanumerics".into(),
            ));
        }
        if self.paused.title.trim().is_empty() || self.paused.message.trim().is_empty() {
            return Err(ConfigError::Validation(
                "paused.title and paused.message must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Secondary asset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Maximum number of secondary files accepted per create or update.
    pub max_files: usize,
    /// Filename prefix; assets are saved as `{prefix}{n}.{ext}`.
    pub prefix: String,
    /// Extension used when the uploaded name has none, without the dot.
    pub default_extension: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            max_files: 7,
            prefix: "anh".to_string(),
            default_extension: "jpg".to_string(),
        }
    }
}

/// Text of the placeholder served while a page is paused.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PausedConfig {
    pub title: String,
    pub message: String,
}

impl Default for PausedConfig {
    fn default() -> Self {
        Self {
            title: "Paused".to_string(),
            message: "This landing page is temporarily paused.".to_string(),
        }
    }
}

/// Load config from `path`.
///
/// A missing file yields the stock defaults; a present file is parsed,
/// checked for unknown keys and validated.
pub fn load_config(path: &Path) -> Result<PressConfig, ConfigError> {
    if !path.exists() {
        return Ok(PressConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: PressConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `landing-press.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Landing Press Configuration
# ===========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory holding one subdirectory per published landing page.
# Each subdirectory contains index.html (served), index.paused.html
# (present only while paused) and the uploaded images.
published_root = "published"

# JSON file backing the landing page records.
records_file = "landings.json"

# ---------------------------------------------------------------------------
# Secondary assets (images uploaded next to index.html)
# ---------------------------------------------------------------------------
[assets]
# Maximum number of files per create or update (1-50).
max_files = 7

# Files are renamed to {prefix}{n}.{ext}: anh1.jpg, anh2.png, ...
prefix = "anh"

# Extension used when an uploaded file has none.
default_extension = "jpg"

# ---------------------------------------------------------------------------
# Placeholder served while a landing page is paused
# ---------------------------------------------------------------------------
[paused]
title = "Paused"
message = "This landing page is temporarily paused."
"##
}
