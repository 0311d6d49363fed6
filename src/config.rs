//! Settings module.
//!
//! Handles loading, validating, and merging `settings.toml`. Keys follow the
//! upper-case naming static site generators use for plugin settings, so a
//! settings file reads the same as the host's own configuration.
//!
//! ## Settings File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! FLICKR_API_KEY = "..."        # required when a gallery tag is rendered
//! FLICKR_API_SECRET = "..."     # required when a gallery tag is rendered
//! FLICKR_USERNAME = "someone"   # account whose photosets are searched
//!
//! FLICKR_ENDPOINT = "https://api.flickr.com/services/rest/"
//! FLICKR_TIMEOUT_SECS = 60
//! FLICKR_PER_PAGE = 500         # 1-500
//! # FLICKR_CACHE_DIR = ".flickr-cache"
//!
//! [AUTHORS."jane doe"]          # keyed by lower-cased author name
//! bio = "Photographer and walker."
//! avatar = "/images/jane.jpg"
//! ```
//!
//! ## Layering
//!
//! Stock defaults are serialized to a TOML table and the user's file is merged
//! on top of it ([`merge_toml`]), then the result is deserialized with unknown
//! keys rejected. Finally the `FLICKR_*` string keys can be overridden from
//! environment variables of the same name, which keeps API secrets out of
//! version control.
//!
//! ## Lookup
//!
//! Tag handlers do not see [`Settings`] directly. They read individual keys
//! through [`ConfigLookup`], the same narrow capability a host passes to its
//! tag plugins.

use crate::authors::AuthorMetadata;
use crate::flickr::{self, ClientOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const FLICKR_API_KEY: &str = "FLICKR_API_KEY";
pub const FLICKR_API_SECRET: &str = "FLICKR_API_SECRET";
pub const FLICKR_USERNAME: &str = "FLICKR_USERNAME";
pub const FLICKR_ENDPOINT: &str = "FLICKR_ENDPOINT";
pub const FLICKR_CACHE_DIR: &str = "FLICKR_CACHE_DIR";

/// Keys that may be overridden from the process environment.
const ENV_KEYS: &[&str] = &[
    FLICKR_API_KEY,
    FLICKR_API_SECRET,
    FLICKR_USERNAME,
    FLICKR_ENDPOINT,
    FLICKR_CACHE_DIR,
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("missing required setting {0}")]
    MissingKey(String),
    #[error("no AUTHORS entry for author {0:?}")]
    UnknownAuthor(String),
}

/// Read access to individual settings by key.
pub trait ConfigLookup {
    fn get_config(&self, key: &str) -> Option<String>;
}

impl<S: BuildHasher> ConfigLookup for HashMap<String, String, S> {
    fn get_config(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Fetch a key that must be present and non-empty.
pub fn require(config: &dyn ConfigLookup, key: &str) -> Result<String, ConfigError> {
    config
        .get_config(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

/// Plugin settings loaded from `settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    #[serde(rename = "FLICKR_API_KEY", skip_serializing_if = "Option::is_none")]
    pub flickr_api_key: Option<String>,
    #[serde(rename = "FLICKR_API_SECRET", skip_serializing_if = "Option::is_none")]
    pub flickr_api_secret: Option<String>,
    #[serde(rename = "FLICKR_USERNAME", skip_serializing_if = "Option::is_none")]
    pub flickr_username: Option<String>,
    /// REST endpoint. Overridable for proxies and test servers.
    #[serde(rename = "FLICKR_ENDPOINT")]
    pub flickr_endpoint: String,
    /// Per-request timeout in seconds.
    #[serde(rename = "FLICKR_TIMEOUT_SECS")]
    pub flickr_timeout_secs: u64,
    /// Page size for list calls (Flickr caps this at 500).
    #[serde(rename = "FLICKR_PER_PAGE")]
    pub flickr_per_page: u32,
    /// Response cache directory. Caching is off when absent.
    #[serde(rename = "FLICKR_CACHE_DIR", skip_serializing_if = "Option::is_none")]
    pub flickr_cache_dir: Option<String>,
    /// Extra author attributes keyed by lower-cased author name.
    #[serde(rename = "AUTHORS")]
    pub authors: BTreeMap<String, AuthorMetadata>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            flickr_api_key: None,
            flickr_api_secret: None,
            flickr_username: None,
            flickr_endpoint: flickr::DEFAULT_ENDPOINT.to_string(),
            flickr_timeout_secs: 60,
            flickr_per_page: flickr::MAX_PER_PAGE,
            flickr_cache_dir: None,
            authors: BTreeMap::new(),
        }
    }
}

impl ConfigLookup for Settings {
    fn get_config(&self, key: &str) -> Option<String> {
        match key {
            FLICKR_API_KEY => self.flickr_api_key.clone(),
            FLICKR_API_SECRET => self.flickr_api_secret.clone(),
            FLICKR_USERNAME => self.flickr_username.clone(),
            FLICKR_ENDPOINT => Some(self.flickr_endpoint.clone()),
            "FLICKR_TIMEOUT_SECS" => Some(self.flickr_timeout_secs.to_string()),
            "FLICKR_PER_PAGE" => Some(self.flickr_per_page.to_string()),
            FLICKR_CACHE_DIR => self.flickr_cache_dir.clone(),
            _ => None,
        }
    }
}

impl Settings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=flickr::MAX_PER_PAGE).contains(&self.flickr_per_page) {
            return Err(ConfigError::Validation(format!(
                "FLICKR_PER_PAGE must be 1-{}",
                flickr::MAX_PER_PAGE
            )));
        }
        if self.flickr_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "FLICKR_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }
        if !self.flickr_endpoint.starts_with("http://")
            && !self.flickr_endpoint.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "FLICKR_ENDPOINT must be an http(s) URL".into(),
            ));
        }
        if let Some(name) = self.authors.keys().find(|k| **k != k.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "AUTHORS keys must be lower-case, found {name:?}"
            )));
        }
        Ok(())
    }

    /// Override `FLICKR_*` string keys from `lookup` (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ENV_KEYS {
            let Some(value) = lookup(key).filter(|v| !v.is_empty()) else {
                continue;
            };
            match *key {
                FLICKR_API_KEY => self.flickr_api_key = Some(value),
                FLICKR_API_SECRET => self.flickr_api_secret = Some(value),
                FLICKR_USERNAME => self.flickr_username = Some(value),
                FLICKR_ENDPOINT => self.flickr_endpoint = value,
                FLICKR_CACHE_DIR => self.flickr_cache_dir = Some(value),
                _ => {}
            }
        }
    }

    /// Transport options for the Flickr client.
    pub fn client_options(&self, use_cache: bool) -> ClientOptions {
        ClientOptions {
            endpoint: self.flickr_endpoint.clone(),
            timeout: Duration::from_secs(self.flickr_timeout_secs),
            per_page: self.flickr_per_page,
            cache_dir: self
                .flickr_cache_dir
                .as_ref()
                .filter(|_| use_cache)
                .map(PathBuf::from),
        }
    }
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Settings::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a settings file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_settings(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_settings(overlay: Option<toml::Value>) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`, without environment overrides.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    resolve_settings(load_raw_settings(path)?)
}

/// Load settings from `path` and apply `FLICKR_*` environment overrides.
pub fn load_settings_with_env(path: &Path) -> Result<Settings, ConfigError> {
    let mut settings = load_settings(path)?;
    settings.apply_overrides(|key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

/// Returns a fully-commented stock `settings.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_settings_toml() -> &'static str {
    r##"# liquid-flickr settings
# ======================
# All settings are optional until a gallery tag is rendered, at which point
# FLICKR_API_KEY, FLICKR_API_SECRET and FLICKR_USERNAME must be set.
# Unknown keys will cause an error.
#
# Any FLICKR_* string key can also be set through an environment variable
# of the same name; the environment wins over this file.

# ---------------------------------------------------------------------------
# Flickr account
# ---------------------------------------------------------------------------
# API credentials from https://www.flickr.com/services/apps/create/
# FLICKR_API_KEY = ""
# FLICKR_API_SECRET = ""

# Account whose photosets gallery tags search.
# FLICKR_USERNAME = ""

# ---------------------------------------------------------------------------
# Transport
# ---------------------------------------------------------------------------
FLICKR_ENDPOINT = "https://api.flickr.com/services/rest/"

# Per-request timeout in seconds.
FLICKR_TIMEOUT_SECS = 60

# Page size for photoset and photo listings (1-500).
FLICKR_PER_PAGE = 500

# Directory for cached API responses. Omit to disable caching.
# FLICKR_CACHE_DIR = ".flickr-cache"

# ---------------------------------------------------------------------------
# Authors
# ---------------------------------------------------------------------------
# Extra attributes for author objects, keyed by lower-cased author name.
# Attributes the author already has are never overwritten.
# Known fields: bio, avatar, url, email, twitter, github, location.
# Any other string key is kept as an extra attribute.
#
# [AUTHORS."jane doe"]
# bio = "Photographer and walker."
# avatar = "/images/jane.jpg"
"##
}
