//! Centralized configuration for codescout
//!
//! Configuration priority:
//! 1. Environment variables
//! 2. Config file (codescout.toml in the working directory or ~/.config/codescout/config.toml)
//! 3. Default values

use error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Search Configuration
// ============================================================================

/// Configuration for the upstream code search API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search endpoint
    pub api_base: String,

    /// Hard cap on pages fetched per query, regardless of what upstream reports
    pub max_pages: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://grep.app/api/search".to_string(),
            max_pages: 5,
            timeout_secs: 30,
            user_agent: concat!("codescout/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration for the on-disk result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one JSON file per fingerprint
    pub dir: PathBuf,

    /// Maximum age for cache entries in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./cache"),
            ttl_secs: 24 * 60 * 60, // 24 hours
        }
    }
}

// ============================================================================
// GitHub Configuration
// ============================================================================

/// Configuration for the file-content API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// REST API base URL
    pub api_base: String,

    /// API token (loaded from GITHUB_TOKEN by default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Upper bound on simultaneous file fetches per batch; `None` or 0 means unbounded
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            timeout_secs: 30,
            max_concurrent_fetches: Some(16),
        }
    }
}

impl GithubConfig {
    /// Effective concurrency bound, treating 0 as "no bound"
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.max_concurrent_fetches.filter(|n| *n > 0)
    }
}

// ============================================================================
// Log Configuration
// ============================================================================

/// Configuration for the structured operation log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for JSONL operation logs
    pub dir: PathBuf,

    /// Write JSONL operation logs in addition to tracing output
    pub jsonl: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            jsonl: false,
        }
    }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Main configuration structure for codescout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a file
    ///
    /// Looks for `codescout.toml` in the current directory or
    /// `~/.config/codescout/config.toml`
    pub fn load() -> Result<Self> {
        if let Ok(content) = std::fs::read_to_string("codescout.toml") {
            return Ok(toml::from_str(&content)?);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("codescout").join("config.toml");
            if let Ok(content) = std::fs::read_to_string(&config_path) {
                return Ok(toml::from_str(&content)?);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from an explicit path; a missing file is an error here
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScoutError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration with overrides from environment variables
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }

        if let Some(dir) = non_empty("CODESCOUT_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }

        if let Some(base) = non_empty("CODESCOUT_SEARCH_API") {
            self.search.api_base = base;
        }

        if let Some(dir) = non_empty("CODESCOUT_LOG_DIR") {
            self.log.dir = PathBuf::from(dir);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
