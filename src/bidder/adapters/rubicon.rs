use serde::Deserialize;
use serde_json::{json, Value};

use crate::auction::request::AuctionRequest;
use crate::auction::result::Bid;
use crate::bidder::adapters::{parse_openrtb_response, to_body};
use crate::bidder::{BidderAdapter, BidderHttpRequest, RawResponse};
use crate::error::AdapterError;

/// Rubicon-style dialect: the endpoint accepts exactly one impression per
/// call, so a multi-impression auction fans out into one sub-request per
/// impression. Parameters address the placement by account/site/zone ids.
pub struct RubiconAdapter {
    bidder: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct RubiconParams {
    account_id: u64,
    site_id: u64,
    zone_id: u64,
}

impl RubiconAdapter {
    pub fn new(bidder: &str, endpoint: &str) -> Self {
        Self {
            bidder: bidder.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl BidderAdapter for RubiconAdapter {
    fn make_requests(
        &self,
        request: &AuctionRequest,
        params: &Value,
    ) -> Result<Vec<BidderHttpRequest>, AdapterError> {
        let params: RubiconParams = serde_json::from_value(params.clone())
            .map_err(|e| AdapterError::Build(format!("invalid rubicon params: {e}")))?;

        request
            .imp
            .iter()
            .map(|imp| {
                let body = json!({
                    "id": format!("{}-{}", request.id, imp.id),
                    "imp": [{
                        "id": imp.id,
                        "bidfloor": imp.bidfloor,
                        "banner": imp.banner,
                        "video": imp.video,
                        "ext": { "rp": { "zone_id": params.zone_id } },
                    }],
                    "site": {
                        "publisher": { "ext": { "rp": { "account_id": params.account_id } } },
                        "ext": { "rp": { "site_id": params.site_id } },
                    },
                    "device": request.device,
                    "user": request.user,
                    "tmax": request.tmax_ms,
                });
                Ok(BidderHttpRequest {
                    bidder: self.bidder.clone(),
                    url: self.endpoint.clone(),
                    body: to_body(&body)?,
                    imp_ids: vec![imp.id.clone()],
                })
            })
            .collect()
    }

    fn parse_response(
        &self,
        request: &BidderHttpRequest,
        response: &RawResponse,
    ) -> Result<Vec<Bid>, AdapterError> {
        parse_openrtb_response(&self.bidder, request, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    use crate::auction::request::Impression;

    fn two_imp_request() -> AuctionRequest {
        AuctionRequest {
            id: "req-9".to_string(),
            imp: vec![
                Impression {
                    id: "a".to_string(),
                    bidfloor: Some(1.0),
                    banner: Some(json!({"w": 728, "h": 90})),
                    video: None,
                    native: None,
                },
                Impression {
                    id: "b".to_string(),
                    bidfloor: None,
                    banner: Some(json!({"w": 300, "h": 250})),
                    video: None,
                    native: None,
                },
            ],
            bidders: BTreeMap::new(),
            tmax_ms: Some(200),
            site: None,
            app: None,
            device: None,
            user: None,
            cur: None,
        }
    }

    #[test]
    fn splits_one_request_per_impression() {
        let adapter = RubiconAdapter::new("rubicon", "http://rubicon.local/rtb");
        let params = json!({"account_id": 1, "site_id": 2, "zone_id": 3});
        let reqs = adapter.make_requests(&two_imp_request(), &params).unwrap();

        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].imp_ids, vec!["a"]);
        assert_eq!(reqs[1].imp_ids, vec!["b"]);

        let body: serde_json::Value = serde_json::from_str(&reqs[1].body).unwrap();
        assert_eq!(body["imp"][0]["ext"]["rp"]["zone_id"], json!(3));
        assert_eq!(
            body["site"]["publisher"]["ext"]["rp"]["account_id"],
            json!(1)
        );
    }

    #[test]
    fn missing_required_param_fails_the_build() {
        let adapter = RubiconAdapter::new("rubicon", "http://rubicon.local/rtb");
        let params = json!({"site_id": 2, "zone_id": 3});
        assert!(adapter.make_requests(&two_imp_request(), &params).is_err());
    }
}
