//! Resolver configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Sliding expiration applied to cached bindings (60 seconds)
pub const DEFAULT_EVICTION_WINDOW_MS: u64 = 60_000;

/// Minimum spacing between opportunistic sweeps of expired bindings
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;

/// Configuration for a [`VirtualCallResolver`](crate::vcall::VirtualCallResolver)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Time since last access after which a binding may be evicted
    pub eviction_window_ms: u64,
    /// How often lookups also sweep expired bindings
    pub sweep_interval_ms: u64,
    /// Warn when a cached binding is requested under a different signature.
    /// Only honored in debug builds or with the `signature-checks` feature.
    pub check_signatures: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            eviction_window_ms: DEFAULT_EVICTION_WINDOW_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            check_signatures: false,
        }
    }
}

impl ResolverConfig {
    /// Create a new configuration builder
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::default()
    }

    /// Load configuration from a JSON file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: ResolverConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!(
            "Loaded resolver config from {}: {:?}",
            path.as_ref().display(),
            config
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.eviction_window_ms == 0 {
            return Err(Error::InvalidConfig(
                "eviction_window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn eviction_window(&self) -> Duration {
        Duration::from_millis(self.eviction_window_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Whether signature checks are active in this build.
    pub fn signature_checks_enabled(&self) -> bool {
        self.check_signatures && (cfg!(debug_assertions) || cfg!(feature = "signature-checks"))
    }
}

/// Builder for ResolverConfig
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    eviction_window: Option<Duration>,
    sweep_interval: Option<Duration>,
    check_signatures: Option<bool>,
}

impl ResolverConfigBuilder {
    pub fn eviction_window(mut self, window: Duration) -> Self {
        self.eviction_window = Some(window);
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    pub fn check_signatures(mut self, enabled: bool) -> Self {
        self.check_signatures = Some(enabled);
        self
    }

    /// Build the configuration, filling unset values with defaults
    ///
    /// Fails with [`Error::InvalidConfig`] when the eviction window rounds down
    /// to zero milliseconds.
    pub fn build(self) -> Result<ResolverConfig> {
        let default = ResolverConfig::default();
        let config = ResolverConfig {
            eviction_window_ms: self
                .eviction_window
                .map(whole_millis)
                .unwrap_or(default.eviction_window_ms),
            sweep_interval_ms: self
                .sweep_interval
                .map(whole_millis)
                .unwrap_or(default.sweep_interval_ms),
            check_signatures: self.check_signatures.unwrap_or(default.check_signatures),
        };
        config.validate()?;
        Ok(config)
    }
}

fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_window_is_sixty_seconds() {
        let config = ResolverConfig::default();
        assert_eq!(config.eviction_window(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ResolverConfig::builder()
            .eviction_window(Duration::from_millis(250))
            .check_signatures(true)
            .build()
            .unwrap();
        assert_eq!(config.eviction_window_ms, 250);
        assert_eq!(config.sweep_interval_ms, DEFAULT_SWEEP_INTERVAL_MS);
        assert!(config.check_signatures);
    }

    #[test]
    fn test_builder_rejects_sub_millisecond_window() {
        let err = ResolverConfig::builder()
            .eviction_window(Duration::from_micros(500))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_saturates_huge_durations() {
        let config = ResolverConfig::builder()
            .eviction_window(Duration::MAX)
            .sweep_interval(Duration::MAX)
            .build()
            .unwrap();
        assert_eq!(config.eviction_window_ms, u64::MAX);
        assert_eq!(config.sweep_interval_ms, u64::MAX);
    }

    #[test]
    fn test_load_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "eviction_window_ms": 1500 }}"#).unwrap();

        let config = ResolverConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.eviction_window_ms, 1500);
        assert_eq!(config.sweep_interval_ms, DEFAULT_SWEEP_INTERVAL_MS);
        assert!(!config.check_signatures);
    }

    #[test]
    fn test_load_rejects_zero_window() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "eviction_window_ms": 0 }}"#).unwrap();

        let err = ResolverConfig::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ResolverConfig::load_from_path("does-not-exist.json").unwrap_err();
        assert!(err.is_not_found());
    }
}
