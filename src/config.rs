// YAML configuration file

use crate::report::DEFAULT_EXPORT_PREFIX;
use eyre::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "meshek";
const CONFIG_FILE: &str = "config.yaml";

/// Settings loaded from `config.yaml`; every field is optional
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the `.meshek` store
    pub data_dir: Option<PathBuf>,

    /// Reject tasks without an assignee
    pub require_assignee: bool,

    /// Assignee code -> display name
    pub assignees: BTreeMap<String, String>,

    /// File name prefix for exported logs
    pub export_prefix: String,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            require_assignee: false,
            assignees: BTreeMap::new(),
            export_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Platform config location, e.g. `~/.config/meshek/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => match Self::default_path() {
                Some(path) => Self::load_from_path(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Configured data directory, else the platform data directory
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
