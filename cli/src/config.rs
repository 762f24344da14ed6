//! CLI configuration and data file

use fit_common::{Branch, ClassType, Tier};
use fit_entitlements::{EntitlementConfig, MemberRecord, StoreDocument};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Everything the CLI serves from
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFile {
    pub branches: Vec<Branch>,
    pub class_types: Vec<ClassType>,
    pub tiers: Vec<Tier>,
    pub members: Vec<MemberRecord>,
    /// Persisted entitlement stores
    pub store: StoreDocument,
}

impl DataFile {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Service config from `path`, or defaults when absent or unreadable
pub fn load_service_config(path: Option<&str>) -> anyhow::Result<EntitlementConfig> {
    let Some(path) = path else {
        return Ok(EntitlementConfig::default());
    };
    match EntitlementConfig::load(path) {
        Ok(config) => {
            info!(path, "configuration loaded");
            Ok(config)
        }
        Err(e) => {
            warn!(path, error = %e, "config not usable, using defaults");
            Ok(EntitlementConfig::default())
        }
    }
}
