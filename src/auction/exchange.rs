use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::auction::request::AuctionRequest;
use crate::auction::result::{AuctionResult, Bid, BidderStatus};
use crate::bidder::connector::HttpConnector;
use crate::bidder::registry::BidderRegistry;
use crate::bidder::{BidderAdapter, BidderHttpRequest};
use crate::cache::{CacheClient, CacheEntry};
use crate::error::{ExchangeError, FetchError};

const DEFAULT_TMAX_MS: u64 = 250;

/// The exchange core: translates one canonical auction into per-bidder
/// requests, fans them out under a global deadline, and merges whatever
/// survives into a single ranked result.
pub struct ExchangeService {
    registry: Arc<BidderRegistry>,
    connector: HttpConnector,
    cache: Option<Arc<dyn CacheClient>>,
}

/// What one bidder's task hands back to the join loop.
struct BidderOutcome {
    bidder: String,
    bids: Vec<Bid>,
    status: BidderStatus,
    calls: Vec<Value>,
}

impl ExchangeService {
    pub fn new(
        registry: Arc<BidderRegistry>,
        connector: HttpConnector,
        cache: Option<Arc<dyn CacheClient>>,
    ) -> Self {
        Self {
            registry,
            connector,
            cache,
        }
    }

    /// Runs one auction end to end. Per-bidder failures of every kind are
    /// absorbed into the status map; the only hard failure is a structurally
    /// invalid request, rejected before any dispatch.
    pub async fn run_auction(
        &self,
        request: &AuctionRequest,
    ) -> Result<AuctionResult, ExchangeError> {
        request.validate()?;

        let started = Instant::now();
        let tmax = Duration::from_millis(request.tmax_ms.unwrap_or(DEFAULT_TMAX_MS));
        let deadline = started + tmax;

        let mut statuses: BTreeMap<String, BidderStatus> = BTreeMap::new();
        let mut call_details: Vec<Value> = Vec::new();

        // Steps 1-2: resolve adapters and build requests. Both are pure and
        // per-bidder fallible; a broken bidder never drags the others down.
        let mut dispatches: Vec<(String, Arc<dyn BidderAdapter>, Vec<BidderHttpRequest>)> =
            Vec::new();
        for (name, params) in &request.bidders {
            let Some(adapter) = self.registry.adapter_for(name) else {
                statuses.insert(name.clone(), BidderStatus::UnknownBidder);
                continue;
            };
            match adapter.make_requests(request, params) {
                Ok(reqs) if reqs.is_empty() => {
                    statuses.insert(name.clone(), BidderStatus::NoBid);
                }
                Ok(reqs) => dispatches.push((name.clone(), adapter, reqs)),
                Err(e) => {
                    statuses.insert(
                        name.clone(),
                        BidderStatus::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        // Steps 3-5: concurrent fan-out joined at the deadline gate.
        let mut join_set: JoinSet<BidderOutcome> = JoinSet::new();
        let mut pending: HashSet<String> = HashSet::new();
        for (name, adapter, reqs) in dispatches {
            let budget = per_bidder_budget(
                self.registry.info_for(&name).and_then(|i| i.timeout_ms),
                deadline,
            );
            pending.insert(name.clone());
            let connector = self.connector.clone();
            join_set.spawn(run_bidder(name, adapter, reqs, connector, budget));
        }

        let mut bids: Vec<Bid> = Vec::new();
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        while !pending.is_empty() {
            tokio::select! {
                joined = join_set.join_next() => match joined {
                    Some(Ok(outcome)) => {
                        pending.remove(&outcome.bidder);
                        statuses.insert(outcome.bidder, outcome.status);
                        bids.extend(outcome.bids);
                        call_details.extend(outcome.calls);
                    }
                    Some(Err(_)) => continue,
                    None => break,
                },
                _ = &mut sleep => {
                    // The deadline is authoritative: abort stragglers and
                    // discard anything they might still produce.
                    join_set.abort_all();
                    break;
                }
            }
        }
        for name in pending {
            statuses.insert(name, BidderStatus::Timeout);
        }

        // Step 6: deterministic ranking.
        rank_bids(&mut bids, &self.registry);

        // Step 7: best-effort creative caching.
        if let Some(cache) = &self.cache {
            self.cache_creatives(cache.as_ref(), &mut bids).await;
        }

        let result = AuctionResult {
            id: request.id.clone(),
            bids,
            statuses,
        };

        info!(
            target: "auction",
            "{}",
            json!({
                "ts": chrono::Utc::now().to_rfc3339(),
                "request_id": result.id,
                "elapsed_ms": started.elapsed().as_millis() as u64,
                "bid_count": result.bids.len(),
                "statuses": result.statuses,
                "bidder_calls": call_details,
            })
        );

        Ok(result)
    }

    /// Swaps inline markup for short cache ids. Any cache failure downgrades
    /// to inline markup; the auction result is already final at this point.
    async fn cache_creatives(&self, cache: &dyn CacheClient, bids: &mut [Bid]) {
        let entries: Vec<CacheEntry> = bids
            .iter()
            .filter_map(|bid| {
                bid.adm.as_ref().map(|adm| CacheEntry {
                    adm: adm.clone(),
                    ttl_secs: bid.ttl_secs,
                })
            })
            .collect();
        if entries.is_empty() {
            return;
        }

        match cache.store(&entries).await {
            Ok(ids) => {
                let mut ids = ids.into_iter();
                for bid in bids.iter_mut().filter(|b| b.adm.is_some()) {
                    if let Some(id) = ids.next() {
                        bid.cache_id = Some(id);
                        bid.adm = None;
                    }
                }
            }
            Err(e) => {
                warn!(target: "auction", error = %e, "creative cache unavailable, keeping inline markup");
            }
        }
    }
}

/// Per-call budget: the bidder's own timeout, clamped to whatever is left of
/// the global deadline.
fn per_bidder_budget(timeout_ms: Option<u64>, deadline: Instant) -> Duration {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match timeout_ms {
        Some(ms) => remaining.min(Duration::from_millis(ms)),
        None => remaining,
    }
}

/// One bidder's whole dispatch: every sub-request runs concurrently, each
/// resolution is parsed immediately, and the aggregate status is settled only
/// once all sub-requests are in. Partial sub-failures degrade the bidder's
/// result instead of erasing it.
async fn run_bidder(
    bidder: String,
    adapter: Arc<dyn BidderAdapter>,
    requests: Vec<BidderHttpRequest>,
    connector: HttpConnector,
    budget: Duration,
) -> BidderOutcome {
    let calls = requests.iter().map(|req| async {
        let started = Instant::now();
        let outcome = match connector.send(req, budget).await {
            Ok(raw) => match adapter.parse_response(req, &raw) {
                Ok(bids) => Ok(bids),
                Err(e) => Err(("parse_error", e.to_string())),
            },
            Err(FetchError::Timeout(ms)) => {
                Err(("timeout", format!("no response within {ms} ms")))
            }
            Err(e) => Err(("transport_error", e.to_string())),
        };
        let elapsed = started.elapsed().as_millis() as u64;
        (req.url.clone(), outcome, elapsed)
    });

    let mut bids = Vec::new();
    let mut failures: Vec<(&str, String)> = Vec::new();
    let mut details = Vec::new();
    for (url, outcome, elapsed) in join_all(calls).await {
        let result_label = match &outcome {
            Ok(_) => "success",
            Err((kind, _)) => kind,
        };
        details.push(json!({
            "bidder": bidder,
            "url": url,
            "result": result_label,
            "inquiry_time_ms": elapsed,
        }));
        match outcome {
            Ok(sub_bids) => bids.extend(sub_bids),
            Err(failure) => failures.push(failure),
        }
    }

    let status = if !bids.is_empty() {
        BidderStatus::Ok
    } else if failures.is_empty() {
        BidderStatus::NoBid
    } else if failures.iter().all(|(kind, _)| *kind == "timeout") {
        BidderStatus::Timeout
    } else {
        let (_, message) = failures
            .iter()
            .find(|(kind, _)| *kind != "timeout")
            .cloned()
            .unwrap_or_else(|| ("", "bidder failed".to_string()));
        BidderStatus::Error { message }
    };

    BidderOutcome {
        bidder,
        bids,
        status,
        calls: details,
    }
}

/// Price descending; exact ties fall back to registry registration order so
/// the ranking is reproducible run to run.
pub fn rank_bids(bids: &mut [Bid], registry: &BidderRegistry) {
    bids.sort_by(|a, b| {
        b.price.cmp(&a.price).then_with(|| {
            registry
                .registration_index(&a.bidder)
                .cmp(&registry.registration_index(&b.bidder))
        })
    });
}
