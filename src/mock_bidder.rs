use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::State, routing::post, serve, Json, Router};
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::info;

use crate::bidder::adapters::{WireBid, WireBidResponse, WireSeatBid};

/// A stand-in bidder endpoint speaking plain OpenRTB. Used by the demo mode
/// of the binary and by the integration tests, where a fixed price and delay
/// make auction outcomes predictable.
#[derive(Clone)]
pub struct MockBidder {
    pub delay: Duration,
    /// When unset, bids `bidfloor * [1.0, 2.0)` like a live bidder would.
    pub fixed_price: Option<Decimal>,
}

impl Default for MockBidder {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(50),
            fixed_price: None,
        }
    }
}

impl MockBidder {
    pub fn router(self) -> Router {
        Router::new().route("/bid", post(handle_bid)).with_state(self)
    }

    /// Binds an ephemeral local port, serves in the background, and returns
    /// the bound address.
    pub async fn spawn(self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        tokio::spawn(async move {
            let _ = serve(listener, app).await;
        });
        Ok(addr)
    }
}

async fn handle_bid(
    State(mock): State<MockBidder>,
    Json(request): Json<Value>,
) -> Json<WireBidResponse> {
    sleep(mock.delay).await;

    let request_id = request["id"].as_str().unwrap_or("").to_string();
    let imps = request["imp"].as_array().cloned().unwrap_or_default();
    info!(
        target: "mock_bidder",
        request_id = %request_id,
        imp_count = imps.len(),
        "mock bidder received request"
    );

    let mut bids = Vec::new();
    for imp in &imps {
        let Some(imp_id) = imp["id"].as_str() else {
            continue;
        };
        let price = match mock.fixed_price {
            Some(p) => p,
            None => {
                let floor = imp["bidfloor"].as_f64().unwrap_or(0.1);
                let multiplier = rand::thread_rng().gen_range(1.0..2.0);
                Decimal::try_from(floor * multiplier).unwrap_or(Decimal::ONE)
            }
        };
        let bid_id = format!("bid-{imp_id}");
        bids.push(WireBid {
            id: bid_id.clone(),
            impid: imp_id.to_string(),
            price,
            adm: Some(format!(
                "<html><body>Mock Ad<img src=\"http://tracker.local/impression?bid={bid_id}\" style=\"display:none;\" /></body></html>"
            )),
            crid: Some(format!("creative-{imp_id}")),
            exp: Some(300),
        });
    }

    Json(WireBidResponse {
        id: request_id,
        seatbid: vec![WireSeatBid {
            bid: bids,
            seat: Some("mock_seat".to_string()),
        }],
        cur: Some("USD".to_string()),
        nbr: None,
    })
}
