use std::time::Duration;

use reqwest::Client;
use tokio::time::timeout;
use tracing::debug;

use crate::bidder::{BidderHttpRequest, RawResponse};
use crate::error::{ConfigError, FetchError};

/// Shared outbound HTTP executor. One bounded connection pool serves every
/// concurrent auction; each call carries its own deadline.
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// `max_idle_per_host` bounds the pool; `connect_timeout` keeps a dead
    /// endpoint from eating the whole per-call budget on the TCP handshake.
    /// A client that cannot be built with these bounds is a startup failure,
    /// never a silent downgrade to an unbounded pool.
    pub fn new(max_idle_per_host: usize, connect_timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_idle_per_host)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    /// Executes one bidder call. The entire send/read is wrapped in a tokio
    /// timeout, so a stalled DNS lookup or TLS handshake resolves to
    /// `FetchError::Timeout` instead of holding the auction hostage; the
    /// abandoned future is dropped, never awaited again.
    pub async fn send(
        &self,
        request: &BidderHttpRequest,
        budget: Duration,
    ) -> Result<RawResponse, FetchError> {
        let call = async {
            let resp = self
                .client
                .post(&request.url)
                .header("Content-Type", "application/json")
                .body(request.body.clone())
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            Ok(RawResponse { status, body })
        };

        match timeout(budget, call).await {
            Ok(result) => {
                if let Ok(raw) = &result {
                    debug!(
                        bidder = %request.bidder,
                        status = raw.status,
                        "bidder call resolved"
                    );
                }
                result
            }
            Err(_) => Err(FetchError::Timeout(budget.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_pool_bounds() {
        assert!(HttpConnector::new(8, Duration::from_millis(200)).is_ok());
    }
}
