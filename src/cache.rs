use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::error::CacheError;

/// One creative payload to register with the remote cache.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheEntry {
    pub adm: String,
    pub ttl_secs: Option<u64>,
}

/// Remote creative cache contract. The exchange only ever treats a failure
/// here as a downgrade to inline markup.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Returns one retrieval id per entry, in order.
    async fn store(&self, entries: &[CacheEntry]) -> Result<Vec<String>, CacheError>;
}

#[derive(Serialize)]
struct PutsBody<'a> {
    puts: Vec<Put<'a>>,
}

#[derive(Serialize)]
struct Put<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttlseconds: Option<u64>,
}

#[derive(Deserialize)]
struct PutsResponse {
    responses: Vec<PutResponse>,
}

#[derive(Deserialize)]
struct PutResponse {
    uuid: String,
}

/// HTTP client for a prebid-cache style endpoint: POST a batch of creatives,
/// read back one uuid per creative.
pub struct HttpCacheClient {
    client: Client,
    endpoint: String,
    budget: Duration,
}

impl HttpCacheClient {
    pub fn new(endpoint: &str, budget: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            budget,
        }
    }
}

#[async_trait]
impl CacheClient for HttpCacheClient {
    async fn store(&self, entries: &[CacheEntry]) -> Result<Vec<String>, CacheError> {
        let body = PutsBody {
            puts: entries
                .iter()
                .map(|e| Put {
                    value: &e.adm,
                    ttlseconds: e.ttl_secs,
                })
                .collect(),
        };

        let call = async {
            let resp = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(CacheError::Unavailable(format!(
                    "cache returned HTTP {}",
                    resp.status().as_u16()
                )));
            }
            resp.json::<PutsResponse>()
                .await
                .map_err(|e| CacheError::Unavailable(e.to_string()))
        };

        let parsed = timeout(self.budget, call)
            .await
            .map_err(|_| CacheError::Unavailable("cache call timed out".to_string()))??;

        if parsed.responses.len() != entries.len() {
            return Err(CacheError::ShortResponse {
                expected: entries.len(),
                got: parsed.responses.len(),
            });
        }
        Ok(parsed.responses.into_iter().map(|r| r.uuid).collect())
    }
}
