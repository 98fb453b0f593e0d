pub mod appnexus;
pub mod openrtb;
pub mod rubicon;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auction::result::Bid;
use crate::bidder::{BidderAdapter, BidderHttpRequest, RawResponse};
use crate::error::{AdapterError, ConfigError};

/// Builds the adapter for a configured dialect name. The set of dialects is
/// closed at compile time; configuration only picks among them.
pub fn for_dialect(
    bidder: &str,
    dialect: &str,
    endpoint: &str,
) -> Result<Arc<dyn BidderAdapter>, ConfigError> {
    match dialect {
        "openrtb" => Ok(Arc::new(openrtb::OpenRtbAdapter::new(bidder, endpoint))),
        "rubicon" => Ok(Arc::new(rubicon::RubiconAdapter::new(bidder, endpoint))),
        "appnexus" => Ok(Arc::new(appnexus::AppnexusAdapter::new(bidder, endpoint))),
        other => Err(ConfigError::UnknownDialect {
            bidder: bidder.to_string(),
            dialect: other.to_string(),
        }),
    }
}

/// OpenRTB-shaped bid response, the base wire format every shipped dialect
/// answers in.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireBidResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<WireSeatBid>,
    #[serde(default)]
    pub cur: Option<String>,
    #[serde(default)]
    pub nbr: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireSeatBid {
    #[serde(default)]
    pub bid: Vec<WireBid>,
    #[serde(default)]
    pub seat: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireBid {
    pub id: String,
    pub impid: String,
    pub price: Decimal,
    #[serde(default)]
    pub adm: Option<String>,
    #[serde(default)]
    pub crid: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
}

/// Shared response handling: a 204 or an empty body is a clean no-bid, a
/// non-2xx status or unparsable body is a parse failure, and surviving wire
/// bids are normalized into canonical `Bid`s. Bids pointing at impressions
/// this request never carried, or priced at zero or below, are dropped.
pub fn parse_openrtb_response(
    bidder: &str,
    request: &BidderHttpRequest,
    response: &RawResponse,
) -> Result<Vec<Bid>, AdapterError> {
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(Vec::new());
    }
    if !(200..300).contains(&response.status) {
        return Err(AdapterError::Parse(format!(
            "unexpected HTTP status {}",
            response.status
        )));
    }

    let wire: WireBidResponse = serde_json::from_str(&response.body)
        .map_err(|e| AdapterError::Parse(e.to_string()))?;
    if wire.nbr.is_some() {
        return Ok(Vec::new());
    }

    let currency = wire.cur.unwrap_or_else(|| "USD".to_string());
    let mut bids = Vec::new();
    for seatbid in wire.seatbid {
        for bid in seatbid.bid {
            if bid.price <= Decimal::ZERO {
                continue;
            }
            if !request.imp_ids.iter().any(|id| id == &bid.impid) {
                continue;
            }
            bids.push(Bid {
                bidder: bidder.to_string(),
                imp_id: bid.impid,
                price: bid.price,
                currency: currency.clone(),
                adm: bid.adm,
                cache_id: None,
                ttl_secs: bid.exp,
            });
        }
    }
    Ok(bids)
}

/// Serializes a request body, folding serde failures into the adapter error
/// taxonomy.
pub(crate) fn to_body(value: &Value) -> Result<String, AdapterError> {
    serde_json::to_string(value).map_err(|e| AdapterError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn req(imp_ids: &[&str]) -> BidderHttpRequest {
        BidderHttpRequest {
            bidder: "mock".to_string(),
            url: "http://bidder.local/bid".to_string(),
            body: "{}".to_string(),
            imp_ids: imp_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn no_content_is_a_clean_no_bid() {
        let raw = RawResponse {
            status: 204,
            body: String::new(),
        };
        let bids = parse_openrtb_response("mock", &req(&["imp-1"]), &raw).unwrap();
        assert!(bids.is_empty());
    }

    #[test]
    fn server_error_is_a_parse_failure() {
        let raw = RawResponse {
            status: 500,
            body: "oops".to_string(),
        };
        assert!(parse_openrtb_response("mock", &req(&["imp-1"]), &raw).is_err());
    }

    #[test]
    fn garbage_body_is_a_parse_failure() {
        let raw = RawResponse {
            status: 200,
            body: "not json".to_string(),
        };
        assert!(parse_openrtb_response("mock", &req(&["imp-1"]), &raw).is_err());
    }

    #[test]
    fn bids_for_unknown_impressions_are_dropped() {
        let raw = RawResponse {
            status: 200,
            body: r#"{"id":"r","seatbid":[{"bid":[
                {"id":"b1","impid":"imp-1","price":1.5,"adm":"<div/>"},
                {"id":"b2","impid":"imp-9","price":9.0,"adm":"<div/>"}
            ]}]}"#
                .to_string(),
        };
        let bids = parse_openrtb_response("mock", &req(&["imp-1"]), &raw).unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].imp_id, "imp-1");
        assert_eq!(bids[0].price, dec!(1.5));
    }

    #[test]
    fn zero_priced_bids_are_dropped() {
        let raw = RawResponse {
            status: 200,
            body: r#"{"id":"r","seatbid":[{"bid":[
                {"id":"b1","impid":"imp-1","price":0.0}
            ]}]}"#
                .to_string(),
        };
        let bids = parse_openrtb_response("mock", &req(&["imp-1"]), &raw).unwrap();
        assert!(bids.is_empty());
    }

    #[test]
    fn unknown_dialect_is_a_config_error() {
        assert!(for_dialect("x", "nonsense", "http://x.local").is_err());
    }
}
