//! Entitlement service configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file malformed
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Entitlement service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementConfig {
    /// Resolution cache
    pub cache: CacheConfig,
    /// Log a warning whenever a member resolves fail-closed
    pub warn_on_fail_closed: bool,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            warn_on_fail_closed: true,
        }
    }
}

impl EntitlementConfig {
    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse from JSON text; missing keys take their defaults
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Resolution cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache resolved entitlements
    pub enabled: bool,
    /// Maximum cached members
    pub max_capacity: u64,
    /// Entry lifetime in seconds
    pub time_to_live_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 65536,
            time_to_live_secs: 300,
        }
    }
}

impl CacheConfig {
    /// Time-to-live as a duration
    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs(self.time_to_live_secs)
    }
}
