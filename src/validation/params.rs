use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::ConfigError;

/// Validates per-bidder extension payloads against one JSON schema per
/// registered bidder. All schemas load and compile at startup; any problem
/// there is fatal, so request-time validation can never hit a broken schema.
pub struct BidderParamValidator {
    schemas: BTreeMap<String, JSONSchema>,
    /// Pre-built `{"bidder": <schema>, ...}` document splicing the schema
    /// files in verbatim, so introspection reproduces them byte-for-byte.
    combined: String,
}

impl BidderParamValidator {
    /// Loads `{schema_dir}/{bidder}.json` for every name in `bidders`.
    pub fn create<'a>(
        bidders: impl IntoIterator<Item = &'a str>,
        schema_dir: &Path,
    ) -> Result<Self, ConfigError> {
        if !schema_dir.is_dir() {
            return Err(ConfigError::Io {
                path: schema_dir.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "schema directory does not exist",
                ),
            });
        }

        let mut raw = BTreeMap::new();
        let mut schemas = BTreeMap::new();
        for bidder in bidders {
            let path = schema_dir.join(format!("{bidder}.json"));
            if !path.is_file() {
                return Err(ConfigError::MissingSchema {
                    bidder: bidder.to_string(),
                    dir: schema_dir.display().to_string(),
                });
            }
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if content.trim().is_empty() {
                return Err(ConfigError::EmptySchema {
                    bidder: bidder.to_string(),
                });
            }
            let document: Value =
                serde_json::from_str(&content).map_err(|e| ConfigError::BadSchema {
                    bidder: bidder.to_string(),
                    reason: e.to_string(),
                })?;
            let compiled =
                JSONSchema::compile(&document).map_err(|e| ConfigError::BadSchema {
                    bidder: bidder.to_string(),
                    reason: e.to_string(),
                })?;
            raw.insert(bidder.to_string(), content);
            schemas.insert(bidder.to_string(), compiled);
        }

        let combined = Self::combine(&raw);
        Ok(Self { schemas, combined })
    }

    fn combine(raw: &BTreeMap<String, String>) -> String {
        let mut out = String::from("{");
        for (i, (bidder, schema)) in raw.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(bidder);
            out.push_str("\":");
            out.push_str(schema.trim());
        }
        out.push('}');
        out
    }

    /// Human-readable validation messages for one bidder's payload; empty
    /// means valid. An unregistered bidder name is itself a message, never a
    /// panic.
    pub fn validate(&self, bidder: &str, payload: &Value) -> BTreeSet<String> {
        let Some(schema) = self.schemas.get(bidder) else {
            return BTreeSet::from([format!("bidder {bidder} is not supported")]);
        };
        match schema.validate(payload) {
            Ok(()) => BTreeSet::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        }
    }

    pub fn supports(&self, bidder: &str) -> bool {
        self.schemas.contains_key(bidder)
    }

    /// Every loaded schema keyed by bidder name, as one JSON document with
    /// the original file contents spliced in unmodified.
    pub fn schemas(&self) -> &str {
        &self.combined
    }
}
