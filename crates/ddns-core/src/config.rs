//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate.
//! Every field has a default so a partial JSON file deserializes cleanly;
//! front-ends layer environment variables and flags on top.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default endpoint of the DigitalOcean v2 API
pub const DEFAULT_API_BASE_URL: &str = "https://api.digitalocean.com/v2";

/// Largest page the provider will serve
pub const MAX_PAGE_SIZE: u32 = 200;

/// Main DDNS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Public IP resolver configuration
    #[serde(default)]
    pub ip_resolver: IpResolverConfig,

    /// Local catalog location
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate the configuration
    ///
    /// A missing API token or resolver URL is not a configuration error;
    /// those are reported when an operation first needs them.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.ip_resolver.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API bearer token
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,

    /// API root, without a trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Items requested per page when listing
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !is_http_url(&self.base_url) {
            return Err(crate::Error::config(format!(
                "Provider base URL must be http(s), got '{}'",
                self.base_url
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(crate::Error::config(format!(
                "Provider page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Provider timeout must be > 0"));
        }
        if matches!(&self.api_token, Some(token) if token.trim().is_empty()) {
            return Err(crate::Error::config("API token cannot be empty"));
        }
        Ok(())
    }

    /// Replace the token, keeping everything else
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Public IP resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpResolverConfig {
    /// Endpoint answering with the caller's IPv4 address as plain text
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout (in seconds)
    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
}

impl IpResolverConfig {
    /// Validate the IP resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(url) = &self.url {
            if !is_http_url(url) {
                return Err(crate::Error::config(format!(
                    "IP resolver URL must be http(s), got '{url}'"
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("IP resolver timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for IpResolverConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

/// Catalog store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// SQLite database file; `None` lets the front-end pick its default
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// What a reconciliation pass does when one record fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure; later rows stay unchecked
    #[default]
    Abort,
    /// Log the failure, keep going, report it at the end
    Continue,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// TTL given to A records this tool creates (in seconds)
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,

    /// Behaviour of `update_all_managed_subdomains` on a per-record error
    #[serde(default)]
    pub on_record_error: FailurePolicy,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.record_ttl < 30 {
            return Err(crate::Error::config("Record TTL must be at least 30 seconds"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            record_ttl: default_record_ttl(),
            on_record_error: FailurePolicy::default(),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_provider_timeout_secs() -> u64 {
    45
}

fn default_resolver_timeout_secs() -> u64 {
    60
}

fn default_record_ttl() -> u32 {
    3600
}
