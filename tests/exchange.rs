//! End-to-end auction tests driving the exchange against live mock bidder
//! servers bound to ephemeral local ports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal_macros::dec;
use serde_json::json;

use rtb_exchange::auction::request::{AuctionRequest, Impression};
use rtb_exchange::bidder::adapters;
use rtb_exchange::bidder::registry::{BidderInfo, BidderRegistry};
use rtb_exchange::cache::{CacheClient, CacheEntry};
use rtb_exchange::error::CacheError;
use rtb_exchange::mock_bidder::MockBidder;
use rtb_exchange::{BidderStatus, ExchangeService, HttpConnector};

fn endpoint(addr: SocketAddr) -> String {
    format!("http://{addr}/bid")
}

fn register_with_timeout(
    registry: &mut BidderRegistry,
    name: &str,
    dialect: &str,
    endpoint: &str,
    timeout_ms: Option<u64>,
) {
    let adapter = adapters::for_dialect(name, dialect, endpoint).unwrap();
    registry.register(
        name,
        adapter,
        BidderInfo {
            display_name: name.to_string(),
            endpoint: endpoint.to_string(),
            timeout_ms,
            user_sync_url: None,
        },
    );
}

fn register(registry: &mut BidderRegistry, name: &str, dialect: &str, endpoint: &str) {
    register_with_timeout(registry, name, dialect, endpoint, None);
}

fn auction_request(bidders: Vec<(&str, serde_json::Value)>, tmax_ms: u64) -> AuctionRequest {
    AuctionRequest {
        id: "auction-1".to_string(),
        imp: vec![Impression {
            id: "imp-1".to_string(),
            bidfloor: Some(0.5),
            banner: Some(json!({"w": 300, "h": 250})),
            video: None,
            native: None,
        }],
        bidders: bidders
            .into_iter()
            .map(|(n, v)| (n.to_string(), v))
            .collect(),
        tmax_ms: Some(tmax_ms),
        site: Some(json!({"domain": "news.example.com"})),
        app: None,
        device: None,
        user: None,
        cur: None,
    }
}

fn connector() -> HttpConnector {
    HttpConnector::new(8, Duration::from_millis(200)).unwrap()
}

fn service(registry: BidderRegistry) -> ExchangeService {
    ExchangeService::new(Arc::new(registry), connector(), None)
}

#[tokio::test]
async fn every_requested_bidder_gets_exactly_one_status() {
    let fast = MockBidder {
        delay: Duration::from_millis(10),
        fixed_price: Some(dec!(2.00)),
    }
    .spawn()
    .await
    .unwrap();
    let slow = MockBidder {
        delay: Duration::from_millis(20),
        fixed_price: Some(dec!(1.25)),
    }
    .spawn()
    .await
    .unwrap();

    let mut registry = BidderRegistry::new();
    register(&mut registry, "alpha", "openrtb", &endpoint(fast));
    register(&mut registry, "bravo", "openrtb", &endpoint(slow));

    let request = auction_request(
        vec![
            ("alpha", json!({})),
            ("bravo", json!({})),
            ("ghost", json!({})),
        ],
        500,
    );
    let result = service(registry).run_auction(&request).await.unwrap();

    assert_eq!(result.statuses.len(), 3);
    assert_eq!(result.statuses.get("alpha"), Some(&BidderStatus::Ok));
    assert_eq!(result.statuses.get("bravo"), Some(&BidderStatus::Ok));
    assert_eq!(
        result.statuses.get("ghost"),
        Some(&BidderStatus::UnknownBidder)
    );

    // Ranked by price descending.
    assert_eq!(result.bids.len(), 2);
    assert_eq!(result.bids[0].bidder, "alpha");
    assert_eq!(result.bids[0].price, dec!(2.00));
    assert_eq!(result.bids[1].bidder, "bravo");
}

#[tokio::test]
async fn global_deadline_bounds_the_auction_and_marks_stragglers() {
    let sleepy = MockBidder {
        delay: Duration::from_millis(500),
        fixed_price: Some(dec!(9.99)),
    }
    .spawn()
    .await
    .unwrap();

    let mut registry = BidderRegistry::new();
    register(&mut registry, "alpha", "openrtb", &endpoint(sleepy));
    register(&mut registry, "bravo", "openrtb", &endpoint(sleepy));

    let request = auction_request(vec![("alpha", json!({})), ("bravo", json!({}))], 50);

    let started = Instant::now();
    let result = service(registry).run_auction(&request).await.unwrap();
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(400),
        "auction overran its deadline: {elapsed:?}"
    );
    assert!(result.bids.is_empty());
    assert_eq!(result.statuses.get("alpha"), Some(&BidderStatus::Timeout));
    assert_eq!(result.statuses.get("bravo"), Some(&BidderStatus::Timeout));
}

#[tokio::test]
async fn per_bidder_timeout_clamps_below_the_global_deadline() {
    let slow = MockBidder {
        delay: Duration::from_millis(300),
        fixed_price: Some(dec!(9.99)),
    }
    .spawn()
    .await
    .unwrap();
    let fast = MockBidder {
        delay: Duration::from_millis(10),
        fixed_price: Some(dec!(1.10)),
    }
    .spawn()
    .await
    .unwrap();

    // The global budget would let the slow bidder answer; its own 50 ms
    // timeout must cut it off anyway, without touching its sibling.
    let mut registry = BidderRegistry::new();
    register_with_timeout(&mut registry, "alpha", "openrtb", &endpoint(slow), Some(50));
    register(&mut registry, "bravo", "openrtb", &endpoint(fast));

    let request = auction_request(vec![("alpha", json!({})), ("bravo", json!({}))], 1000);
    let result = service(registry).run_auction(&request).await.unwrap();

    assert_eq!(result.statuses.get("alpha"), Some(&BidderStatus::Timeout));
    assert_eq!(result.statuses.get("bravo"), Some(&BidderStatus::Ok));
    assert_eq!(result.bids.len(), 1);
    assert_eq!(result.bids[0].bidder, "bravo");
    assert_eq!(result.bids[0].price, dec!(1.10));
}

#[tokio::test]
async fn one_bidders_build_failure_does_not_stop_the_others() {
    let mock = MockBidder {
        delay: Duration::from_millis(10),
        fixed_price: Some(dec!(1.50)),
    }
    .spawn()
    .await
    .unwrap();

    let mut registry = BidderRegistry::new();
    // Rubicon's adapter requires account/site/zone ids; an empty payload
    // fails the build step for this bidder only.
    register(&mut registry, "rubicon", "rubicon", &endpoint(mock));
    register(&mut registry, "bravo", "openrtb", &endpoint(mock));

    let request = auction_request(vec![("rubicon", json!({})), ("bravo", json!({}))], 500);
    let result = service(registry).run_auction(&request).await.unwrap();

    assert_eq!(result.bids.len(), 1);
    assert_eq!(result.bids[0].bidder, "bravo");
    assert_eq!(result.bids[0].price, dec!(1.50));
    assert!(matches!(
        result.statuses.get("rubicon"),
        Some(BidderStatus::Error { .. })
    ));
}

#[tokio::test]
async fn multi_impression_rubicon_fans_out_and_merges() {
    let mock = MockBidder {
        delay: Duration::from_millis(10),
        fixed_price: Some(dec!(0.80)),
    }
    .spawn()
    .await
    .unwrap();

    let mut registry = BidderRegistry::new();
    register(&mut registry, "rubicon", "rubicon", &endpoint(mock));

    let mut request = auction_request(
        vec![(
            "rubicon",
            json!({"account_id": 1, "site_id": 2, "zone_id": 3}),
        )],
        500,
    );
    request.imp.push(Impression {
        id: "imp-2".to_string(),
        bidfloor: None,
        banner: Some(json!({"w": 728, "h": 90})),
        video: None,
        native: None,
    });

    let result = service(registry).run_auction(&request).await.unwrap();

    assert_eq!(result.statuses.get("rubicon"), Some(&BidderStatus::Ok));
    let mut imp_ids: Vec<_> = result.bids.iter().map(|b| b.imp_id.clone()).collect();
    imp_ids.sort();
    assert_eq!(imp_ids, vec!["imp-1", "imp-2"]);
}

struct FailingCache;

#[async_trait]
impl CacheClient for FailingCache {
    async fn store(&self, _entries: &[CacheEntry]) -> Result<Vec<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

struct CountingCache;

#[async_trait]
impl CacheClient for CountingCache {
    async fn store(&self, entries: &[CacheEntry]) -> Result<Vec<String>, CacheError> {
        Ok((0..entries.len()).map(|i| format!("uuid-{i}")).collect())
    }
}

#[tokio::test]
async fn cache_failure_keeps_inline_markup() {
    let mock = MockBidder {
        delay: Duration::from_millis(10),
        fixed_price: Some(dec!(3.00)),
    }
    .spawn()
    .await
    .unwrap();

    let mut registry = BidderRegistry::new();
    register(&mut registry, "alpha", "openrtb", &endpoint(mock));

    let exchange = ExchangeService::new(
        Arc::new(registry),
        connector(),
        Some(Arc::new(FailingCache)),
    );

    let request = auction_request(vec![("alpha", json!({}))], 500);
    let result = exchange.run_auction(&request).await.unwrap();

    assert_eq!(result.bids.len(), 1);
    assert!(result.bids[0].adm.is_some());
    assert!(result.bids[0].cache_id.is_none());
}

#[tokio::test]
async fn cached_creatives_replace_inline_markup() {
    let mock = MockBidder {
        delay: Duration::from_millis(10),
        fixed_price: Some(dec!(3.00)),
    }
    .spawn()
    .await
    .unwrap();

    let mut registry = BidderRegistry::new();
    register(&mut registry, "alpha", "openrtb", &endpoint(mock));

    let exchange = ExchangeService::new(
        Arc::new(registry),
        connector(),
        Some(Arc::new(CountingCache)),
    );

    let request = auction_request(vec![("alpha", json!({}))], 500);
    let result = exchange.run_auction(&request).await.unwrap();

    assert_eq!(result.bids.len(), 1);
    assert!(result.bids[0].adm.is_none());
    assert_eq!(result.bids[0].cache_id.as_deref(), Some("uuid-0"));
}

#[tokio::test]
async fn total_bidder_failure_returns_a_well_formed_empty_result() {
    // Nothing listens on this port; the connector reports transport errors.
    let mut registry = BidderRegistry::new();
    register(&mut registry, "alpha", "openrtb", "http://127.0.0.1:1/bid");

    let request = auction_request(vec![("alpha", json!({}))], 500);
    let result = service(registry).run_auction(&request).await.unwrap();

    assert!(result.bids.is_empty());
    assert_eq!(result.statuses.len(), 1);
    assert!(matches!(
        result.statuses.get("alpha"),
        Some(BidderStatus::Error { .. }) | Some(BidderStatus::Timeout)
    ));
}
