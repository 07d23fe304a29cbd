//! Configuration management for staycompare.
//!
//! The config file is discovered with the prefer crate and parsed with serde
//! according to its extension. Every section has defaults, so a missing file
//! yields a working (if property-less) configuration.

pub mod browser;
mod channel;

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::extract::{RuleSet, RuleSpec};
use crate::models::Channel;

pub use browser::BrowserConfig;
pub use channel::{ChannelAdapterConfig, EthicalPolicy, RateLimitPolicy, RetryPolicy};

/// Default cache TTL (15 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 900;

/// Default cap on simultaneous outbound channel fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 3;

/// Honest default request identity.
pub const DEFAULT_USER_AGENT: &str =
    "staycompare/0.1 (nightly rate comparison; respects robots.txt)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Pools of request identities rotated between outbound requests.
///
/// Rotation is an operational courtesy that avoids presenting one fixed
/// fingerprint across a burst of requests. It is not a security control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Product token matched against robots.txt `User-agent` groups.
    #[serde(default = "default_product_token")]
    pub product_token: String,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    #[serde(default = "default_header_sets")]
    pub header_sets: Vec<HashMap<String, String>>,
}

fn default_product_token() -> String {
    "staycompare".to_string()
}

fn default_user_agents() -> Vec<String> {
    vec![DEFAULT_USER_AGENT.to_string()]
}

fn default_header_sets() -> Vec<HashMap<String, String>> {
    vec![HashMap::from([
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
        (
            "Accept".to_string(),
            "text/html,application/json;q=0.9,*/*;q=0.8".to_string(),
        ),
    ])]
}

impl IdentityConfig {
    /// Every user agent and header set must form a legal HTTP header.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for agent in &self.user_agents {
            HeaderValue::from_str(agent).map_err(|_| {
                ConfigError::Invalid(format!("user agent '{}' is not a valid header value", agent))
            })?;
        }
        for (name, value) in self.header_sets.iter().flatten() {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ConfigError::Invalid(format!("'{}' is not a valid header name", name))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                ConfigError::Invalid(format!("header {} has an invalid value", name))
            })?;
        }
        Ok(())
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            product_token: default_product_token(),
            user_agents: default_user_agents(),
            header_sets: default_header_sets(),
        }
    }
}

/// Text-extraction settings shared by every page-based channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Extra rules evaluated before the built-in list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
    /// Extra CSS selectors for candidate price regions on fetched pages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub region_selectors: Vec<String>,
}

/// Listing URLs for one property, keyed by channel name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub listings: HashMap<String, String>,
}

impl PropertyConfig {
    /// Listing URLs with recognised channel names.
    pub fn channel_listings(&self) -> HashMap<Channel, String> {
        self.listings
            .iter()
            .filter_map(|(name, url)| match name.parse::<Channel>() {
                Ok(channel) => Some((channel, url.clone())),
                Err(e) => {
                    warn!("Ignoring listing: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Tie-break order when two channels quote the same total.
    #[serde(default = "default_channel_priority")]
    pub channel_priority: Vec<Channel>,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Adapter settings keyed by channel name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub channels: HashMap<String, ChannelAdapterConfig>,
    /// Per-property channel listings keyed by property id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, PropertyConfig>,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_max_concurrent_fetches() -> usize {
    DEFAULT_MAX_CONCURRENT_FETCHES
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_channel_priority() -> Vec<Channel> {
    Channel::ALL.to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            default_currency: default_currency(),
            channel_priority: default_channel_priority(),
            identity: IdentityConfig::default(),
            extraction: ExtractionConfig::default(),
            browser: BrowserConfig::default(),
            channels: HashMap::new(),
            properties: HashMap::new(),
            source_path: None,
        }
    }
}

impl Config {
    /// Discover and load the config file, falling back to defaults.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("staycompare").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config at {}: {}", path.display(), e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => {
                debug!("No config file found, using defaults");
                Self::default_with_env()
            }
        }
    }

    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config.with_env_overrides())
    }

    /// Parse config text in the given format (`toml`, `yaml`/`yml`, else JSON).
    pub fn parse(contents: &str, format: &str) -> Result<Self, ConfigError> {
        match format {
            "toml" => toml::from_str(contents)
                .map_err(|e| ConfigError::Parse(format!("TOML: {}", e))),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| ConfigError::Parse(format!("YAML: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| ConfigError::Parse(format!("JSON: {}", e))),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.default_currency.len() != 3 {
            return Err(ConfigError::Invalid(format!(
                "default_currency must be a 3-letter code, got '{}'",
                self.default_currency
            )));
        }
        for name in self.channels.keys() {
            name.parse::<Channel>().map_err(ConfigError::Invalid)?;
        }
        RuleSet::new(&self.extraction.rules)?;
        self.identity.validate()?;
        for (name, channel) in &self.channels {
            let limits = &channel.rate_limit;
            if limits.requests_per_minute == 0 || limits.burst_limit == 0 || limits.max_per_hour == 0
            {
                return Err(ConfigError::Invalid(format!(
                    "rate limits for {} must be positive",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Apply `STAYCOMPARE_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ttl) = env::var("STAYCOMPARE_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.cache.ttl_secs = ttl;
        }

        if let Some(limit) = env::var("STAYCOMPARE_MAX_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            self.max_concurrent_fetches = limit;
        }

        if let Ok(key) = env::var("STAYCOMPARE_AIRBNB_API_KEY") {
            if !key.is_empty() {
                self.channels
                    .entry(Channel::Airbnb.as_str().to_string())
                    .or_default()
                    .api_key = Some(key);
            }
        }

        self
    }

    /// Adapter settings for a channel (defaults when not configured).
    pub fn channel_config(&self, channel: Channel) -> ChannelAdapterConfig {
        self.channels
            .iter()
            .find(|(name, _)| name.parse::<Channel>().ok() == Some(channel))
            .map(|(_, config)| config.clone())
            .unwrap_or_default()
    }

    /// Channel listings configured for a property.
    pub fn property_listings(&self, property_id: &str) -> Option<HashMap<Channel, String>> {
        self.properties
            .get(property_id)
            .map(PropertyConfig::channel_listings)
    }
}
