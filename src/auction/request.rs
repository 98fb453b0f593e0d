use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExchangeError;

/// The canonical incoming auction request. Contextual objects (site, app,
/// device, user) are opaque to the exchange and passed through to adapters
/// as raw JSON.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuctionRequest {
    pub id: String,
    pub imp: Vec<Impression>,
    /// Bidder name -> that bidder's opaque extension payload. A bidder
    /// participates in the auction iff it has an entry here.
    #[serde(default)]
    pub bidders: BTreeMap<String, Value>,
    /// Global auction budget in milliseconds.
    #[serde(default)]
    pub tmax_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur: Option<Vec<String>>,
}

/// One ad placement opportunity. Format objects stay as raw JSON so each
/// adapter can forward whatever subset its bidder understands.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Impression {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidfloor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<Value>,
}

impl AuctionRequest {
    /// Structural validation, run once before any dispatch. "No bidders" and
    /// "no bids" are valid auctions; only a request that cannot be auctioned
    /// at all is rejected.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.id.is_empty() {
            return Err(ExchangeError::MalformedRequest(
                "auction id is empty".to_string(),
            ));
        }
        if self.imp.is_empty() {
            return Err(ExchangeError::MalformedRequest(
                "auction has no impressions".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for imp in &self.imp {
            if imp.id.is_empty() {
                return Err(ExchangeError::MalformedRequest(
                    "impression with empty id".to_string(),
                ));
            }
            if !seen.insert(imp.id.as_str()) {
                return Err(ExchangeError::MalformedRequest(format!(
                    "duplicate impression id {}",
                    imp.id
                )));
            }
        }
        Ok(())
    }
}
