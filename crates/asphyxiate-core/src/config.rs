//! Extraction settings, loadable from TOML

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Settings for one extraction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Take the brief from the first sentence when there is no `@brief`
    pub autobrief: bool,
    /// Register undocumented declarations too
    pub extract_all: bool,
    /// Warn when `@param` names a parameter the declaration lacks
    pub warn_param_mismatch: bool,
    /// Run both phases on a rayon pool
    pub parallel: bool,
    /// Size of the pool (None = use Rayon default)
    pub threads: Option<usize>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            autobrief: true,
            extract_all: false,
            warn_param_mismatch: true,
            parallel: true,
            threads: None,
        }
    }
}

impl ExtractorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid TOML, unknown keys or a zero thread count.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("`threads` must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_autobrief(mut self, autobrief: bool) -> Self {
        self.autobrief = autobrief;
        self
    }

    #[must_use]
    pub fn with_extract_all(mut self, extract_all: bool) -> Self {
        self.extract_all = extract_all;
        self
    }

    #[must_use]
    pub fn with_warn_param_mismatch(mut self, warn: bool) -> Self {
        self.warn_param_mismatch = warn;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the number of threads
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert!(config.autobrief);
        assert!(!config.extract_all);
        assert!(config.parallel);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_partial_toml() {
        let config = ExtractorConfig::from_toml_str("extract_all = true\nthreads = 2\n").unwrap();
        assert!(config.extract_all);
        assert!(config.autobrief);
        assert_eq!(config.threads, Some(2));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = ExtractorConfig::from_toml_str("autobreif = false").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_threads_is_invalid() {
        let err = ExtractorConfig::from_toml_str("threads = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_builders() {
        let config = ExtractorConfig::new()
            .with_autobrief(false)
            .with_parallel(false)
            .with_threads(3);
        assert!(!config.autobrief);
        assert!(!config.parallel);
        assert_eq!(config.threads, Some(3));
    }
}
