pub mod api;
pub mod auction;
pub mod bidder;
pub mod cache;
pub mod config;
pub mod error;
pub mod mock_bidder;
pub mod validation;

pub use auction::exchange::ExchangeService;
pub use auction::request::AuctionRequest;
pub use auction::result::{AuctionResult, Bid, BidderStatus};
pub use bidder::connector::HttpConnector;
pub use bidder::registry::BidderRegistry;
pub use validation::params::BidderParamValidator;
