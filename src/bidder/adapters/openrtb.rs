use serde_json::{json, Value};

use crate::auction::request::AuctionRequest;
use crate::auction::result::Bid;
use crate::bidder::adapters::{parse_openrtb_response, to_body};
use crate::bidder::{BidderAdapter, BidderHttpRequest, RawResponse};
use crate::error::AdapterError;

/// The plain OpenRTB dialect: one request carrying every impression, with
/// the bidder's extension payload attached under `imp[].ext.bidder`.
pub struct OpenRtbAdapter {
    bidder: String,
    endpoint: String,
}

impl OpenRtbAdapter {
    pub fn new(bidder: &str, endpoint: &str) -> Self {
        Self {
            bidder: bidder.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl BidderAdapter for OpenRtbAdapter {
    fn make_requests(
        &self,
        request: &AuctionRequest,
        params: &Value,
    ) -> Result<Vec<BidderHttpRequest>, AdapterError> {
        let imps: Vec<Value> = request
            .imp
            .iter()
            .map(|imp| {
                json!({
                    "id": imp.id,
                    "bidfloor": imp.bidfloor,
                    "banner": imp.banner,
                    "video": imp.video,
                    "native": imp.native,
                    "ext": { "bidder": params },
                })
            })
            .collect();

        let body = json!({
            "id": request.id,
            "imp": imps,
            "site": request.site,
            "app": request.app,
            "device": request.device,
            "user": request.user,
            "cur": request.cur,
            "tmax": request.tmax_ms,
        });

        Ok(vec![BidderHttpRequest {
            bidder: self.bidder.clone(),
            url: self.endpoint.clone(),
            body: to_body(&body)?,
            imp_ids: request.imp.iter().map(|i| i.id.clone()).collect(),
        }])
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

    fn request() -> AuctionRequest {
        AuctionRequest {
            id: "req-1".to_string(),
            imp: vec![
                Impression {
                    id: "imp-1".to_string(),
                    bidfloor: Some(0.5),
                    banner: Some(json!({"w": 300, "h": 250})),
                    video: None,
                    native: None,
                },
                Impression {
                    id: "imp-2".to_string(),
                    bidfloor: None,
                    banner: None,
                    video: Some(json!({"mimes": ["video/mp4"]})),
                    native: None,
                },
            ],
            bidders: BTreeMap::new(),
            tmax_ms: Some(250),
            site: Some(json!({"domain": "news.example.com"})),
            app: None,
            device: None,
            user: None,
            cur: Some(vec!["USD".to_string()]),
        }
    }

    #[test]
    fn builds_one_request_covering_all_impressions() {
        let adapter = OpenRtbAdapter::new("generic", "http://bidder.local/rtb");
        let reqs = adapter
            .make_requests(&request(), &json!({"seat": 7}))
            .unwrap();

        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].imp_ids, vec!["imp-1", "imp-2"]);

        let body: serde_json::Value = serde_json::from_str(&reqs[0].body).unwrap();
        assert_eq!(body["imp"].as_array().unwrap().len(), 2);
        assert_eq!(body["imp"][0]["ext"]["bidder"]["seat"], json!(7));
        assert_eq!(body["tmax"], json!(250));
    }
}
