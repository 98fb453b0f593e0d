use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A canonical bid, already normalized out of whatever dialect the bidder
/// answered in. Prices are decimals end to end; floats never touch money
/// inside the exchange.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bid {
    pub bidder: String,
    pub imp_id: String,
    pub price: Decimal,
    pub currency: String,
    /// Inline creative markup. Cleared when the creative was registered with
    /// the cache and `cache_id` is set instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// Per-bidder outcome recorded for every bidder that was requested,
/// successful or not.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum BidderStatus {
    Ok,
    NoBid,
    UnknownBidder,
    Timeout,
    Error { message: String },
}

/// The merged outcome of one auction: ranked bids plus one status entry per
/// requested bidder.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuctionResult {
    pub id: String,
    pub bids: Vec<Bid>,
    pub statuses: BTreeMap<String, BidderStatus>,
}
