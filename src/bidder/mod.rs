pub mod adapters;
pub mod connector;
pub mod registry;

use serde_json::Value;

use crate::auction::request::AuctionRequest;
use crate::auction::result::Bid;
use crate::error::AdapterError;

/// One outbound HTTP call to a bidder, fully built: the endpoint plus the
/// serialized body in that bidder's dialect. Owned by the dispatch that
/// created it and discarded once the call resolves.
#[derive(Debug, Clone)]
pub struct BidderHttpRequest {
    pub bidder: String,
    pub url: String,
    pub body: String,
    /// Impression ids this request covers; used by adapters that split the
    /// auction into one call per impression.
    pub imp_ids: Vec<String>,
}

/// Raw material handed back to the adapter for parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The per-bidder translation contract. Implementations are pure: no I/O, no
/// state retained across calls, so one instance serves any number of
/// concurrent auctions.
///
/// Returning zero requests (the bidder opts out of these placements) or zero
/// bids (a clean no-bid) is not an error.
pub trait BidderAdapter: Send + Sync {
    fn make_requests(
        &self,
        request: &AuctionRequest,
        params: &Value,
    ) -> Result<Vec<BidderHttpRequest>, AdapterError>;

    fn parse_response(
        &self,
        request: &BidderHttpRequest,
        response: &RawResponse,
    ) -> Result<Vec<Bid>, AdapterError>;
}
