use crate::constants::*;
use crate::date_normalizer::DateNormalizer;
use crate::error::{ConfigError, Result};
use crate::storage::DuplicatePolicy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub selectors: SelectorConfig,
    pub dates: DatesConfig,
    pub description: DescriptionConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub listing_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Links fetched at the same time
    pub concurrency: usize,
    /// Deadline for the whole run; completed records are still saved when it fires
    pub run_timeout_seconds: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            concurrency: DEFAULT_CONCURRENCY,
            run_timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

fn owned(exprs: &[&str]) -> Vec<String> {
    exprs.iter().map(|s| s.to_string()).collect()
}

/// Selector candidates per field, most specific first.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub listing_links: Vec<String>,
    pub title: Vec<String>,
    pub description: Vec<String>,
    pub date: Vec<String>,
    pub prices: Vec<String>,
    pub schedule: Vec<String>,
    pub location: Vec<String>,
    pub address: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_links: owned(LISTING_LINK_SELECTORS),
            title: owned(TITLE_SELECTORS),
            description: owned(DESCRIPTION_SELECTORS),
            date: owned(DATE_SELECTORS),
            prices: owned(PRICE_SELECTORS),
            schedule: owned(SCHEDULE_SELECTORS),
            location: owned(LOCATION_SELECTORS),
            address: owned(ADDRESS_SELECTORS),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatesConfig {
    /// Replaces the built-in Italian month table when set
    pub months: Option<BTreeMap<String, u32>>,
}

impl DatesConfig {
    pub fn normalizer(&self) -> std::result::Result<DateNormalizer, ConfigError> {
        match &self.months {
            Some(months) => {
                let table: Vec<(&str, u32)> = months.iter().map(|(k, v)| (k.as_str(), *v)).collect();
                DateNormalizer::with_months(&table)
            }
            None => Ok(DateNormalizer::new()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DescriptionConfig {
    pub enabled: bool,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    /// Takes precedence over `api_key_env`
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub timeout_seconds: u64,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: DEFAULT_DESCRIPTION_API_BASE.to_string(),
            model: DEFAULT_DESCRIPTION_MODEL.to_string(),
            max_tokens: DEFAULT_DESCRIPTION_MAX_TOKENS,
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl DescriptionConfig {
    /// Fills `api_key` from the environment when the file did not set one.
    pub fn resolve_api_key(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var(&self.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub prometheus_port: Option<u16>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
