use thiserror::Error;

/// Failures raised while translating between the canonical auction shape and
/// one bidder's dialect. Always recovered inside the exchange; they only ever
/// surface as a per-bidder status entry.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to build bidder request: {0}")]
    Build(String),
    #[error("failed to parse bidder response: {0}")]
    Parse(String),
}

/// Outcome of a single outbound HTTP call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Creative cache failures. Never fatal to an auction.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache returned {got} ids for {expected} entries")]
    ShortResponse { expected: usize, got: usize },
}

/// The only error `run_auction` itself returns. Everything per-bidder is
/// absorbed into the status map instead.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("malformed auction request: {0}")]
    MalformedRequest(String),
}

/// Startup-time configuration failures. Fatal: the process refuses to serve
/// with a broken registry or schema set.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {reason}")]
    Invalid { path: String, reason: String },
    #[error("bidder {bidder} has no parameter schema in {dir}")]
    MissingSchema { bidder: String, dir: String },
    #[error("parameter schema for {bidder} is empty")]
    EmptySchema { bidder: String },
    #[error("parameter schema for {bidder} is not a valid JSON schema: {reason}")]
    BadSchema { bidder: String, reason: String },
    #[error("unknown adapter dialect {dialect:?} for bidder {bidder}")]
    UnknownDialect { bidder: String, dialect: String },
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
