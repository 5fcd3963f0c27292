use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cache::DEFAULT_TTL_SECS;

const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the REST backend
  #[serde(default = "default_api_url")]
  pub url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds a fetched collection is served without refetching
  pub ttl_secs: u64,
  /// Give up on a backend request after this many seconds
  pub fetch_timeout_secs: Option<u64>,
  /// Let concurrent cache misses share one request
  pub single_flight: bool,
  /// Keep cached collections in SQLite across runs
  pub persist: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: DEFAULT_TTL_SECS as u64,
      fetch_timeout_secs: Some(30),
      single_flight: false,
      persist: false,
    }
  }
}

impl CacheConfig {
  /// The TTL as a duration. Values beyond what chrono can represent are
  /// rejected instead of wrapping.
  pub fn ttl(&self) -> Result<Duration> {
    i64::try_from(self.ttl_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .ok_or_else(|| eyre!("cache.ttl_secs is out of range: {}", self.ttl_secs))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./academe.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/academe/config.yaml
  ///
  /// Without any file, the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => {
        debug!(path = %p.display(), "Loading config");
        Self::load_from_path(&p)
      }
      None => {
        info!("No config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("academe.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("academe").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    config.cache.ttl()?;
    Ok(config)
  }

  /// Get the API bearer token from the environment, if set.
  ///
  /// Checks ACADEME_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("ACADEME_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}
