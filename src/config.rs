//! Configuration management for komiksync.
//!
//! Settings are read from an optional TOML file and then overridden from the
//! environment. Every field has a default, so an empty or missing file yields
//! a usable configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file name searched in the working directory.
pub const CONFIG_FILE_NAME: &str = "komiksync.toml";

/// Default base URL of the external catalog API.
pub const DEFAULT_BASE_URL: &str = "https://api.shngm.io/v1";

/// Default database file.
pub const DEFAULT_DATABASE: &str = "komiksync.db";

/// Default checkpoint file.
pub const DEFAULT_CHECKPOINT: &str = "crawler_checkpoint.json";

/// Browser user agent sent to the external catalog.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Default header set mimicking a browser talking to the catalog's web app.
pub fn default_headers() -> BTreeMap<String, String> {
    [
        ("User-Agent", BROWSER_USER_AGENT),
        ("Origin", "https://app.shinigami.asia"),
        ("Referer", "https://app.shinigami.asia/"),
        ("Sec-Fetch-Mode", "cors"),
        ("Sec-Fetch-Site", "cross-site"),
        ("Accept", "application/json, text/plain, */*"),
        ("Accept-Language", "en-US,en;q=0.9"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Fixed inter-request delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delays {
    /// Between pages of a simple taxonomy enumeration.
    pub taxonomy_page_ms: u64,
    /// Between pages of one author/artist search query.
    pub search_page_ms: u64,
    /// Between two author/artist search queries.
    pub search_query_ms: u64,
    /// Between manga list pages.
    pub manga_page_ms: u64,
    /// Between chapter list pages of one manga.
    pub chapter_page_ms: u64,
    /// Between manga during a bulk chapter crawl.
    pub between_manga_ms: u64,
    /// Between chapters during a bulk page crawl.
    pub between_chapters_ms: u64,
    /// Between pages of an auto-update check.
    pub update_page_ms: u64,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            taxonomy_page_ms: 200,
            search_page_ms: 100,
            search_query_ms: 300,
            manga_page_ms: 500,
            chapter_page_ms: 200,
            between_manga_ms: 500,
            between_chapters_ms: 100,
            update_page_ms: 200,
        }
    }
}

impl Delays {
    /// All delays set to zero.
    pub fn none() -> Self {
        Self {
            taxonomy_page_ms: 0,
            search_page_ms: 0,
            search_query_ms: 0,
            manga_page_ms: 0,
            chapter_page_ms: 0,
            between_manga_ms: 0,
            between_chapters_ms: 0,
            update_page_ms: 0,
        }
    }
}

/// Pagination controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    /// Items between checkpoint saves in the chapter and page phases.
    pub batch_size: usize,
    /// Report entities instead of persisting them.
    pub dry_run: bool,
    /// Log every request URL.
    pub verbose: bool,
    pub request_timeout_secs: u64,
    pub manga_page_size: u32,
    /// Stop an enumeration after this many pages without a new entity.
    pub max_duplicate_pages: u32,
    /// Stop an unbounded sweep after this many consecutive failed pages.
    pub max_failed_pages: u32,
    pub delays: Delays,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headers: default_headers(),
            batch_size: 10,
            dry_run: false,
            verbose: false,
            request_timeout_secs: 30,
            manga_page_size: 24,
            max_duplicate_pages: 3,
            max_failed_pages: 5,
            delays: Delays::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.manga_page_size == 0 {
            return Err(ConfigError::Invalid(
                "manga page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Auto-update poller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoUpdateConfig {
    pub interval_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
    /// When false the poller keeps ticking but skips the check.
    pub enabled: bool,
    pub crawl_chapters: bool,
    pub crawl_pages: bool,
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            page_size: 24,
            max_pages: 5,
            enabled: true,
            crawl_chapters: true,
            crawl_pages: false,
        }
    }
}

impl AutoUpdateConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Check the bounds accepted by the administrative surface.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < 60 {
            return Err(ConfigError::Invalid(
                "interval must be at least 1 minute".to_string(),
            ));
        }
        if !(1..=100).contains(&self.page_size) {
            return Err(ConfigError::Invalid(
                "page size must be between 1 and 100".to_string(),
            ));
        }
        if !(1..=20).contains(&self.max_pages) {
            return Err(ConfigError::Invalid(
                "max pages must be between 1 and 20".to_string(),
            ));
        }
        Ok(())
    }
}

/// Catalog store deadlines, applied as SQLite busy timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 10,
            write_timeout_secs: 30,
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: PathBuf,
    pub checkpoint: PathBuf,
    pub store: StoreConfig,
    pub crawler: CrawlerConfig,
    pub auto_update: AutoUpdateConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
            store: StoreConfig::default(),
            crawler: CrawlerConfig::default(),
            auto_update: AutoUpdateConfig::default(),
        }
    }
}

/// Options controlling where settings come from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file; must exist when set.
    pub config_path: Option<PathBuf>,
    /// Skip environment overrides.
    pub ignore_env: bool,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `KOMIKSYNC_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db) = std::env::var("KOMIKSYNC_DATABASE") {
            self.database = PathBuf::from(db);
        }
        if let Ok(checkpoint) = std::env::var("KOMIKSYNC_CHECKPOINT") {
            self.checkpoint = PathBuf::from(checkpoint);
        }
        if let Ok(base_url) = std::env::var("KOMIKSYNC_BASE_URL") {
            self.crawler.base_url = base_url;
        }
    }
}

/// Load settings from the config file (if any) and the environment.
pub fn load_settings(options: &LoadOptions) -> Result<Settings, ConfigError> {
    let path = match &options.config_path {
        Some(path) => Some(path.clone()),
        None => {
            let candidate = PathBuf::from(CONFIG_FILE_NAME);
            candidate.exists().then_some(candidate)
        }
    };

    let mut settings = match path {
        Some(path) => {
            let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            Settings::from_toml(&text, &path)?
        }
        None => Settings::default(),
    };

    if !options.ignore_env {
        settings.apply_env();
    }

    settings.crawler.validate()?;
    settings.auto_update.validate()?;
    Ok(settings)
}
