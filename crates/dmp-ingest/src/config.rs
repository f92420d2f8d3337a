//! Ingestion configuration
//!
//! Loaded from TOML or YAML (picked by file extension); every field has a
//! default so partial files are fine.

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// CRediT contributor role vocabulary
pub const DEFAULT_ROLE_ONTOLOGY_BASE_URL: &str = "https://dictionary.casrai.org/Contributor_Roles";

/// Settings for the resolution pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// This application's namespace (dmp id type, extended attribute key)
    pub application_name: String,
    /// Language assigned to new plans and organizations
    pub default_language: String,
    /// Base URL stripped from submitted role URIs
    pub role_ontology_base_url: String,
    /// Time box for the external organization lookup
    pub lookup_timeout_ms: u64,
    /// Maximum cached lookup terms
    pub lookup_cache_capacity: u64,
    /// Lookup cache time to live
    pub lookup_cache_ttl_secs: u64,
    /// Window during which a create request may update its own fresh plan
    pub duplicate_grace_secs: u64,
    /// Fresh resolution passes after a commit conflict
    pub commit_retries: u32,
}

impl IngestConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With application name
    #[inline]
    #[must_use]
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// With default language
    #[inline]
    #[must_use]
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    /// With role ontology base URL
    #[inline]
    #[must_use]
    pub fn with_role_ontology_base_url(mut self, url: impl Into<String>) -> Self {
        self.role_ontology_base_url = url.into();
        self
    }

    /// With lookup timeout
    #[inline]
    #[must_use]
    pub fn with_lookup_timeout_ms(mut self, ms: u64) -> Self {
        self.lookup_timeout_ms = ms;
        self
    }

    /// With lookup cache sizing
    #[inline]
    #[must_use]
    pub fn with_lookup_cache(mut self, capacity: u64, ttl_secs: u64) -> Self {
        self.lookup_cache_capacity = capacity;
        self.lookup_cache_ttl_secs = ttl_secs;
        self
    }

    /// With duplicate grace window
    #[inline]
    #[must_use]
    pub fn with_duplicate_grace_secs(mut self, secs: u64) -> Self {
        self.duplicate_grace_secs = secs;
        self
    }

    /// With commit retries
    #[inline]
    #[must_use]
    pub fn with_commit_retries(mut self, retries: u32) -> Self {
        self.commit_retries = retries;
        self
    }

    /// Lookup timeout as a duration
    #[inline]
    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Lookup cache TTL as a duration
    #[inline]
    #[must_use]
    pub fn lookup_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.lookup_cache_ttl_secs)
    }

    /// Duplicate grace window as a signed duration
    #[must_use]
    pub fn duplicate_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.duplicate_grace_secs).unwrap_or(i64::MAX))
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for blank names or zero timeouts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.trim().is_empty() {
            return Err(ConfigError::Invalid("application_name must not be blank".into()));
        }
        if self.default_language.trim().is_empty() {
            return Err(ConfigError::Invalid("default_language must not be blank".into()));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::Invalid("lookup_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Load and validate from a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = load_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            application_name: "dmproadmap".to_string(),
            default_language: "en".to_string(),
            role_ontology_base_url: DEFAULT_ROLE_ONTOLOGY_BASE_URL.to_string(),
            lookup_timeout_ms: 5_000,
            lookup_cache_capacity: 1_000,
            lookup_cache_ttl_secs: 3_600,
            duplicate_grace_secs: 60,
            commit_retries: 2,
        }
    }
}

/// Deserialize a TOML or YAML file, chosen by extension
///
/// # Errors
/// Returns error if the file cannot be read or parsed
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "toml" => Ok(toml::from_str(&content)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = IngestConfig::new();
        assert_eq!(config.application_name, "dmproadmap");
        assert_eq!(config.lookup_timeout(), Duration::from_secs(5));
        assert_eq!(config.duplicate_grace(), chrono::Duration::seconds(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders() {
        let config = IngestConfig::new()
            .with_application_name("dmptool")
            .with_commit_retries(5)
            .with_lookup_cache(10, 20);
        assert_eq!(config.application_name, "dmptool");
        assert_eq!(config.commit_retries, 5);
        assert_eq!(config.lookup_cache_ttl(), Duration::from_secs(20));
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "application_name = \"dmptool\"\ncommit_retries = 4").unwrap();
        let config = IngestConfig::from_file(file.path()).unwrap();
        assert_eq!(config.application_name, "dmptool");
        assert_eq!(config.commit_retries, 4);
        assert_eq!(config.default_language, "en");
    }

    #[test]
    fn loads_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "default_language: fr\nlookup_timeout_ms: 250").unwrap();
        let config = IngestConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_language, "fr");
        assert_eq!(config.lookup_timeout_ms, 250);
    }

    #[test]
    fn rejects_unknown_extension_and_bad_values() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            IngestConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let config = IngestConfig::new().with_lookup_timeout_ms(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
