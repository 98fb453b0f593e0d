use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bidder::BidderAdapter;

/// Static metadata carried alongside each adapter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BidderInfo {
    pub display_name: String,
    pub endpoint: String,
    /// Per-bidder call budget in milliseconds; clamped to the remaining
    /// global deadline at dispatch time.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub user_sync_url: Option<String>,
}

struct Entry {
    adapter: Arc<dyn BidderAdapter>,
    info: BidderInfo,
}

/// Name -> adapter mapping, append-only while the process boots and
/// immutable once published behind an `Arc`. Lookups never lock.
///
/// Registration order doubles as the tie-break rank for equal-priced bids,
/// so it is preserved explicitly.
#[derive(Default)]
pub struct BidderRegistry {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl BidderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Startup-only. Re-registering a name replaces the adapter but keeps
    /// the original rank.
    pub fn register(&mut self, name: &str, adapter: Arc<dyn BidderAdapter>, info: BidderInfo) {
        if !self.entries.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.entries
            .insert(name.to_string(), Entry { adapter, info });
    }

    pub fn adapter_for(&self, name: &str) -> Option<Arc<dyn BidderAdapter>> {
        self.entries.get(name).map(|e| Arc::clone(&e.adapter))
    }

    pub fn info_for(&self, name: &str) -> Option<&BidderInfo> {
        self.entries.get(name).map(|e| &e.info)
    }

    /// Registration rank used to break price ties deterministically. Names
    /// never registered sort last.
    pub fn registration_index(&self, name: &str) -> usize {
        self.order
            .iter()
            .position(|n| n == name)
            .unwrap_or(usize::MAX)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
