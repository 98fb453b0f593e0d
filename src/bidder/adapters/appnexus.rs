use serde::Deserialize;
use serde_json::{json, Value};

use crate::auction::request::AuctionRequest;
use crate::auction::result::Bid;
use crate::bidder::adapters::{parse_openrtb_response, to_body};
use crate::bidder::{BidderAdapter, BidderHttpRequest, RawResponse};
use crate::error::AdapterError;

/// AppNexus-style dialect: one call for the whole auction, placements
/// addressed by a numeric placement id written into `imp[].tagid`. An
/// optional member id is appended to the endpoint query string.
pub struct AppnexusAdapter {
    bidder: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct AppnexusParams {
    placement_id: u64,
    #[serde(default)]
    member: Option<String>,
}

impl AppnexusAdapter {
    pub fn new(bidder: &str, endpoint: &str) -> Self {
        Self {
            bidder: bidder.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl BidderAdapter for AppnexusAdapter {
    fn make_requests(
        &self,
        request: &AuctionRequest,
        params: &Value,
    ) -> Result<Vec<BidderHttpRequest>, AdapterError> {
        let params: AppnexusParams = serde_json::from_value(params.clone())
            .map_err(|e| AdapterError::Build(format!("invalid appnexus params: {e}")))?;

        let imps: Vec<Value> = request
            .imp
            .iter()
            .map(|imp| {
                json!({
                    "id": imp.id,
                    "tagid": params.placement_id.to_string(),
                    "bidfloor": imp.bidfloor,
                    "banner": imp.banner,
                    "video": imp.video,
                    "native": imp.native,
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
            "tmax": request.tmax_ms,
        });

        let url = match &params.member {
            Some(member) => format!("{}?member_id={}", self.endpoint, member),
            None => self.endpoint.clone(),
        };

        Ok(vec![BidderHttpRequest {
            bidder: self.bidder.clone(),
            url,
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
