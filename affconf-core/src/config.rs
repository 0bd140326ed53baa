//! Reader configuration.
//!
//! Loaded from environment variables with defaults matching the constants in
//! the crate root.

use crate::{ConfigError, DEFAULT_ENTITY_CACHE_WINDOW, DEFAULT_MAX_AGE, MAX_SAVE_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Freshness and retry settings for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Maximum age of a default store before a read forces a reload.
    pub max_age: Duration,
    /// Sliding window after which an idle cached application is re-resolved.
    pub entity_cache_window: Duration,
    /// Total persist attempts when saving meets stale-credential conflicts.
    pub save_attempts: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            entity_cache_window: DEFAULT_ENTITY_CACHE_WINDOW,
            save_attempts: MAX_SAVE_ATTEMPTS,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create ReaderConfig from environment variables.
    ///
    /// Environment variables:
    /// - `AFFCONF_MAX_AGE_SECS`: store freshness bound (default: 60)
    /// - `AFFCONF_ENTITY_CACHE_WINDOW_SECS`: application cache window (default: 300)
    /// - `AFFCONF_SAVE_ATTEMPTS`: conflict retry budget (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_age: env_secs("AFFCONF_MAX_AGE_SECS")?.unwrap_or(defaults.max_age),
            entity_cache_window: env_secs("AFFCONF_ENTITY_CACHE_WINDOW_SECS")?
                .unwrap_or(defaults.entity_cache_window),
            save_attempts: env_parse("AFFCONF_SAVE_ATTEMPTS")?.unwrap_or(defaults.save_attempts),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_entity_cache_window(mut self, window: Duration) -> Self {
        self.entity_cache_window = window;
        self
    }

    pub fn with_save_attempts(mut self, attempts: u32) -> Self {
        self.save_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.save_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "save_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw.clone(),
                reason: "not a non-negative integer".to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_secs(key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.max_age, Duration::from_secs(60));
        assert_eq!(config.entity_cache_window, Duration::from_secs(300));
        assert_eq!(config.save_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ReaderConfig::new()
            .with_max_age(Duration::from_secs(1))
            .with_entity_cache_window(Duration::from_secs(10))
            .with_save_attempts(3);
        assert_eq!(config.max_age, Duration::from_secs(1));
        assert_eq!(config.entity_cache_window, Duration::from_secs(10));
        assert_eq!(config.save_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = ReaderConfig::new().with_save_attempts(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "save_attempts"
        ));
    }

    #[test]
    fn test_serde_roundtrip_preserves_durations() {
        let config = ReaderConfig::new().with_max_age(Duration::from_millis(1500));
        let json = serde_json::to_string(&config).unwrap();
        let back: ReaderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
