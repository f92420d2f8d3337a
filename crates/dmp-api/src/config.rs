//! API configuration
//!
//! Wraps the ingestion settings and adds what only the API layer needs:
//! pagination defaults, the public plan URL and the ROR endpoint.

use dmp_ingest::{load_file, ConfigError, IngestConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Public ROR search endpoint
pub const DEFAULT_ROR_URL: &str = "https://api.ror.org/organizations";

/// External organization search settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RorConfig {
    /// Query ROR at all; the in-memory registry is used alone otherwise
    pub enabled: bool,
    /// Search endpoint, queried with `?query=<term>`
    pub base_url: String,
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
}

impl Default for RorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: DEFAULT_ROR_URL.to_string(),
            request_timeout_ms: 3000,
        }
    }
}

impl RorConfig {
    /// Request timeout as a duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings for the API layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Resolution pipeline settings
    pub ingest: IngestConfig,
    /// Page size when the caller gives none
    pub default_per_page: u32,
    /// Largest page size a caller may ask for
    pub max_per_page: u32,
    /// Prefix of the public plan URL, the plan id is appended
    pub plan_url_base: String,
    /// External organization search
    pub ror: RorConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            default_per_page: 20,
            max_per_page: 100,
            plan_url_base: "https://dmp.example.org/api/v2/plans/".to_string(),
            ror: RorConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With ingestion settings
    #[must_use]
    pub fn with_ingest(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }

    /// With pagination defaults
    #[must_use]
    pub fn with_pagination(mut self, default_per_page: u32, max_per_page: u32) -> Self {
        self.default_per_page = default_per_page;
        self.max_per_page = max_per_page;
        self
    }

    /// With public plan URL prefix
    #[must_use]
    pub fn with_plan_url_base(mut self, base: impl Into<String>) -> Self {
        self.plan_url_base = base.into();
        self
    }

    /// With ROR settings
    #[must_use]
    pub fn with_ror(mut self, ror: RorConfig) -> Self {
        self.ror = ror;
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ingest.validate()?;
        if self.max_per_page == 0 {
            return Err(ConfigError::Invalid("max_per_page must be positive".into()));
        }
        if self.default_per_page == 0 || self.default_per_page > self.max_per_page {
            return Err(ConfigError::Invalid(format!(
                "default_per_page must be within 1..={}",
                self.max_per_page
            )));
        }
        if self.ror.enabled && self.ror.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("ror.base_url is required when ror is enabled".into()));
        }
        Ok(())
    }

    /// Load and validate a TOML or YAML file
    ///
    /// # Errors
    /// Returns `ConfigError` on read, parse or validation failure
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = load_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
