//! Configuration infrastructure
//!
//! Harvest settings are read from one settings file (format chosen by its
//! extension) with `HARVESTER__SECTION__KEY` environment overrides on top.
//! Each site is described by a flat key→selector map that lives either inline
//! in the settings file or in its own per-site file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::site_config::normalize_key;
use crate::domain::{ProductCategory, SiteConfig};
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// Complete harvest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    /// Pacing, timeouts and block detection of each extraction engine
    pub engine: EngineSettings,

    /// HTTP navigator settings
    pub http: HttpSettings,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Whether site jobs run one after another or as concurrent tasks
    pub execution: ExecutionMode,

    /// What happens to the remaining URLs of a site after a block
    pub block_policy: BlockPolicy,

    /// Fixed run seed; a random one is drawn when absent
    pub seed: Option<u64>,

    /// Sites to harvest, in order
    pub sites: Vec<SiteEntry>,
}

/// Per-engine crawl behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum detail URLs taken from one listing page
    pub max_listings: usize,

    /// Lower bound of the randomized pause between fetches
    pub min_delay_ms: u64,

    /// Upper bound of the randomized pause between fetches
    pub max_delay_ms: u64,

    /// How long to wait for the product container on a listing page
    pub wait_timeout_ms: u64,

    /// Upper bound for one navigation including page source retrieval
    pub navigation_timeout_ms: u64,

    /// Case-insensitive phrases that identify an anti-bot page
    pub block_markers: Vec<String>,

    /// Ask the navigator to scroll detail pages before reading them
    pub scroll_for_lazy_content: bool,
}

/// Settings of the HTTP navigator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// User agents rotated per request
    pub user_agents: Vec<String>,

    /// Rate limit floor per navigator
    pub max_requests_per_second: u32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Optional proxy URLs, one picked per navigator
    pub proxies: Vec<String>,

    /// Follow HTTP redirects
    pub follow_redirects: bool,

    /// Redirect hop limit when following redirects
    pub max_redirects: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output (stderr; stdout carries harvested records)
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; the platform data directory when absent
    pub log_dir: Option<PathBuf>,

    /// Prefix of the daily rolled log files
    pub file_name_prefix: String,

    /// Offset from UTC used for log timestamps
    pub utc_offset_hours: i32,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// Record the blocked URL as failed and move on to the next one
    #[default]
    ContinueWithNextUrl,
    /// Stop visiting the site; remaining URLs are recorded as skipped
    AbandonSite,
}

/// One site of the harvest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteEntry {
    /// Product variant built from this site's pages
    pub category: ProductCategory,

    /// Per-site selector file, relative to the settings file
    pub config_file: Option<PathBuf>,

    /// Inline selectors; they override keys of `config_file`
    pub selectors: HashMap<String, String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_listings: defaults::MAX_LISTINGS,
            min_delay_ms: defaults::MIN_DELAY_MS,
            max_delay_ms: defaults::MAX_DELAY_MS,
            wait_timeout_ms: defaults::WAIT_TIMEOUT_MS,
            navigation_timeout_ms: defaults::NAVIGATION_TIMEOUT_MS,
            block_markers: defaults::BLOCK_MARKERS.iter().map(|s| s.to_string()).collect(),
            scroll_for_lazy_content: defaults::SCROLL_FOR_LAZY_CONTENT,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agents: defaults::USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            proxies: Vec::new(),
            follow_redirects: true,
            max_redirects: defaults::MAX_REDIRECTS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            utc_offset_hours: defaults::LOG_UTC_OFFSET_HOURS,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "error".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters.insert("product_harvester".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl EngineSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Reject settings that would make every crawl pointless
    pub fn validate(&self) -> HarvestResult<()> {
        if self.max_listings == 0 {
            return Err(HarvestError::config("engine.max_listings", "must be at least 1"));
        }
        if self.navigation_timeout_ms == 0 {
            return Err(HarvestError::config("engine.navigation_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

/// Configuration manager for loading settings and per-site selector files
pub struct ConfigManager {
    pub config_path: PathBuf,
    env_source: Option<HashMap<String, String>>,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get the application data directory (default log location)
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(data_dir)
    }

    /// Manager for the settings file in the user config directory
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::SETTINGS_FILE_NAME);
        Ok(Self::with_path(config_path))
    }

    /// Manager for an explicit settings file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            env_source: None,
        }
    }

    /// Read environment overrides from `vars` instead of the process environment
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load settings; a missing file yields the defaults plus environment overrides
    pub fn load_settings(&self) -> Result<HarvestSettings> {
        if self.config_path.exists() {
            info!("Loading harvest settings from: {:?}", self.config_path);
        } else {
            info!("Settings file not found, using defaults: {:?}", self.config_path);
        }

        let environment = Environment::with_prefix(defaults::ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("engine.block_markers")
            .with_list_parse_key("http.user_agents")
            .with_list_parse_key("http.proxies")
            .source(self.env_source.clone());

        let settings: HarvestSettings = Config::builder()
            .add_source(File::from(self.config_path.as_path()).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read settings: {:?}", self.config_path))?
            .try_deserialize()
            .with_context(|| format!("Invalid settings in {:?}", self.config_path))?;

        debug!("Loaded {} site entries", settings.sites.len());
        Ok(settings)
    }

    /// Flat key→selector map of one per-site file
    pub fn load_site_selectors(path: &Path) -> Result<HashMap<String, String>> {
        let selectors: HashMap<String, String> = Config::builder()
            .add_source(File::from(path))
            .build()
            .with_context(|| format!("Failed to read site config: {:?}", path))?
            .try_deserialize()
            .with_context(|| format!("Site config is not a flat key/value map: {:?}", path))?;

        debug!("Loaded {} selectors from {:?}", selectors.len(), path);
        Ok(selectors)
    }

    /// Selector map of a site entry: file keys, then inline overrides, then the
    /// entry's category as `targetCategory` unless the map names one
    pub fn site_selectors(&self, entry: &SiteEntry) -> Result<HashMap<String, String>> {
        let mut selectors = match &entry.config_file {
            Some(file) => Self::load_site_selectors(&self.resolve_relative(file))?,
            None => HashMap::new(),
        };
        selectors.extend(entry.selectors.iter().map(|(k, v)| (k.clone(), v.clone())));
        if !selectors.keys().any(|k| normalize_key(k) == "targetcategory") {
            selectors.insert("targetCategory".to_string(), entry.category.to_string());
        }
        Ok(selectors)
    }

    /// Build every site's `SiteConfig` without validating it
    pub fn site_configs(&self, settings: &HarvestSettings) -> Result<Vec<(ProductCategory, SiteConfig)>> {
        settings
            .sites
            .iter()
            .map(|entry| Ok((entry.category, SiteConfig::from_map(self.site_selectors(entry)?))))
            .collect()
    }

    fn resolve_relative(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            return file.to_path_buf();
        }
        self.config_path
            .parent()
            .map_or_else(|| file.to_path_buf(), |dir| dir.join(file))
    }
}

/// Default harvest configuration values
pub mod defaults {
    /// Directory name under the platform config/data directories
    pub const APP_DIR_NAME: &str = "product-harvester";

    /// Settings file looked up in the config directory
    pub const SETTINGS_FILE_NAME: &str = "harvester.toml";

    /// Prefix of environment overrides (`HARVESTER__ENGINE__MAX_LISTINGS=5`)
    pub const ENV_PREFIX: &str = "HARVESTER";

    /// Default maximum detail URLs per listing page
    pub const MAX_LISTINGS: usize = 10;

    /// Default lower bound of the pause between fetches
    pub const MIN_DELAY_MS: u64 = 1500;

    /// Default upper bound of the pause between fetches
    pub const MAX_DELAY_MS: u64 = 4000;

    /// Default wait for the product container on a listing page
    pub const WAIT_TIMEOUT_MS: u64 = 10_000;

    /// Default bound for one navigation
    pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

    pub const SCROLL_FOR_LAZY_CONTENT: bool = true;

    /// Phrases anti-bot pages show instead of content
    pub const BLOCK_MARKERS: &[&str] = &[
        "captcha",
        "access denied",
        "unusual traffic",
        "are you a robot",
        "verify you are human",
        "too many requests",
    ];

    pub const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    ];

    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const MAX_REDIRECTS: usize = 5;

    // Logging defaults
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_PREFIX: &str = "harvester";
    pub const LOG_UTC_OFFSET_HOURS: i32 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = HarvestSettings::default();
        assert_eq!(settings.engine.max_listings, 10);
        assert_eq!(settings.execution, ExecutionMode::Sequential);
        assert_eq!(settings.block_policy, BlockPolicy::ContinueWithNextUrl);
        assert!(settings.engine.block_markers.iter().any(|m| m == "captcha"));
        assert!(settings.engine.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("absent.toml")).with_env_source(HashMap::new());
        let settings = manager.load_settings().unwrap();
        assert_eq!(settings.engine.max_listings, defaults::MAX_LISTINGS);
        assert!(settings.sites.is_empty());
    }

    #[test]
    fn test_settings_file_with_site_files_and_env_override() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("phones.json"),
            r#"{ "url": "https://shop.example/dtdd", "productContainer": ".item", "name": "h1" }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("harvester.toml"),
            r#"
execution = "parallel"
block_policy = "abandon_site"

[engine]
max_listings = 4
min_delay_ms = 10
max_delay_ms = 20

[[sites]]
category = "smartphone"
config_file = "phones.json"

[[sites]]
category = "laptop"
[sites.selectors]
url = "https://laptops.example/list"
product_container = "div.card"
name = "h1.title"
"#,
        )
        .unwrap();

        let env = HashMap::from([("HARVESTER__ENGINE__MAX_LISTINGS".to_string(), "7".to_string())]);
        let manager = ConfigManager::with_path(dir.path().join("harvester.toml")).with_env_source(env);
        let settings = manager.load_settings().unwrap();

        assert_eq!(settings.execution, ExecutionMode::Parallel);
        assert_eq!(settings.block_policy, BlockPolicy::AbandonSite);
        assert_eq!(settings.engine.max_listings, 7);
        assert_eq!(settings.engine.min_delay_ms, 10);
        assert_eq!(settings.sites.len(), 2);

        let sites = manager.site_configs(&settings).unwrap();
        assert_eq!(sites[0].0, ProductCategory::Smartphone);
        assert_eq!(sites[0].1.product_container(), ".item");
        assert_eq!(sites[0].1.target_category(), ProductCategory::Smartphone);
        assert!(sites[0].1.validate().is_ok());
        assert_eq!(sites[1].1.name(), "h1.title");
        assert_eq!(sites[1].1.target_category(), ProductCategory::Laptop);
    }

    #[test]
    fn test_missing_site_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("harvester.toml"));
        let entry = SiteEntry {
            category: ProductCategory::Generic,
            config_file: Some(PathBuf::from("nope.toml")),
            selectors: HashMap::new(),
        };
        assert!(manager.site_selectors(&entry).is_err());
    }

    #[test]
    fn test_engine_validation() {
        let settings = EngineSettings {
            max_listings: 0,
            ..EngineSettings::default()
        };
        assert!(matches!(settings.validate(), Err(HarvestError::Config { .. })));
    }
}
