// Configuration loading

use eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com/todos";
pub const DEFAULT_FETCH_LIMIT: u32 = 4;

/// Settings for the remote task API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collection endpoint; single tasks live at `{base_url}/{id}`
    pub base_url: String,
    /// Number of tasks requested by the initial fetch (`?_limit=`)
    pub fetch_limit: Option<u32>,
    /// Full list URL, overriding `base_url` + `fetch_limit`
    pub list_url: Option<String>,
    /// Per-request timeout in seconds; none means wait indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch_limit: Some(DEFAULT_FETCH_LIMIT),
            list_url: None,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Default config file location: `<config dir>/todostore/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("todostore").join("config.yaml"))
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default location is read
    /// if present, otherwise built-in defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(eyre!("Config file not found: {}", path.display()));
        }
        let content = fs::read_to_string(path).wrap_err("Failed to read config file")?;
        let config: Config = serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse config file {}", path.display()))?;
        info!(path = %path.display(), base_url = %config.base_url, "Loaded config");
        Ok(config)
    }

    /// URL used for the initial fetch
    pub fn list_url(&self) -> String {
        if let Some(url) = &self.list_url {
            return url.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        match self.fetch_limit {
            Some(limit) => format!("{}?_limit={}", base, limit),
            None => base.to_string(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
