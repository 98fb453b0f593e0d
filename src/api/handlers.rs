use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{extract::State, Json};
use serde_json::json;
use tracing::error;

use crate::auction::exchange::ExchangeService;
use crate::auction::request::AuctionRequest;
use crate::validation::params::BidderParamValidator;

/// Shared handler state, wired once in `main`.
pub struct AppState {
    pub exchange: Arc<ExchangeService>,
    pub validator: Arc<BidderParamValidator>,
}

/// POST /openrtb2/auction: validate bidder extensions, then run the auction.
/// A no-bid auction is 204, not an error; only a structurally broken request
/// is 400.
pub async fn handle_auction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuctionRequest>,
) -> Response {
    // Gate the opaque extension payloads before dispatch. Unknown bidder
    // names pass through: the exchange records those as a status instead.
    let mut param_errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, payload) in &request.bidders {
        if !state.validator.supports(name) {
            continue;
        }
        let messages = state.validator.validate(name, payload);
        if !messages.is_empty() {
            param_errors.insert(name.clone(), messages.into_iter().collect());
        }
    }
    if !param_errors.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid bidder params", "details": param_errors})),
        )
            .into_response();
    }

    match state.exchange.run_auction(&request).await {
        Ok(result) if result.bids.is_empty() => {
            (StatusCode::NO_CONTENT, Json(result)).into_response()
        }
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            error!(target: "auction", request_id = %request.id, error = %e, "auction rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// GET /bidders/params: the loaded schemas, verbatim.
pub async fn handle_bidder_params(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.validator.schemas().to_string(),
    )
        .into_response()
}

/// GET /status: liveness probe.
pub async fn handle_status() -> &'static str {
    "ok"
}
