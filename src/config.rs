use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bidder::adapters;
use crate::bidder::registry::{BidderInfo, BidderRegistry};
use crate::error::ConfigError;

/// One bidder as declared in `bidders.json`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BidderConfigEntry {
    pub name: String,
    /// Which of the built-in adapter dialects this bidder speaks.
    pub dialect: String,
    pub endpoint: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub user_sync_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub fn load_bidders(path: &Path) -> Result<Vec<BidderConfigEntry>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Invalid {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Builds the immutable registry from configuration. Disabled bidders are
/// skipped; everything else registers in file order, which fixes the
/// tie-break rank for the lifetime of the process.
pub fn build_registry(entries: &[BidderConfigEntry]) -> Result<BidderRegistry, ConfigError> {
    let mut registry = BidderRegistry::new();
    for entry in entries.iter().filter(|e| e.enabled) {
        let adapter = adapters::for_dialect(&entry.name, &entry.dialect, &entry.endpoint)?;
        let info = BidderInfo {
            display_name: entry
                .display_name
                .clone()
                .unwrap_or_else(|| entry.name.clone()),
            endpoint: entry.endpoint.clone(),
            timeout_ms: entry.timeout_ms,
            user_sync_url: entry.user_sync_url.clone(),
        };
        registry.register(&entry.name, adapter, info);
    }
    Ok(registry)
}
