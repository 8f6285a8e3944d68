//! Fetching and decoding one secret source
//!
//! Turns a `SourceDescriptor` into a `FetchOutcome`: build the resource
//! path, call the transport (retrying transient failures), parse the
//! response's `data` map, and base64-decode every selected value.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::source::{FetchOutcome, RawSecret, SourceDescriptor};
use crate::transport::Transport;

/// Wire shape of a secret resource. Only `data` is consumed; every other
/// field the server sends is ignored.
#[derive(Debug, Deserialize)]
struct SecretManifest {
    #[serde(default)]
    data: HashMap<String, String>,
}

/// Fetches and decodes single secret sources.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Fetch one source, retrying transient transport failures with
    /// exponential backoff and jitter. Terminal failures (unauthorized,
    /// not found, malformed payload) return immediately.
    pub async fn fetch(&self, source: &SourceDescriptor) -> FetchOutcome {
        let path = source.resource_path();
        let source_id = source.id();
        let mut attempt = 1u32;

        loop {
            match self.transport.get(&path, &source_id).await {
                Ok(body) => return self.decode(source, &body),
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    debug!(
                        source = %source_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient transport error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return match err {
                        crate::error::Error::NotFound { .. } => FetchOutcome::NotFound,
                        crate::error::Error::Unauthorized { .. } => FetchOutcome::Unauthorized,
                        crate::error::Error::Transport {
                            retryable, message, ..
                        } => FetchOutcome::Transport { retryable, message },
                        other => FetchOutcome::Transport {
                            retryable: false,
                            message: other.to_string(),
                        },
                    };
                }
            }
        }
    }

    /// Parse and decode a response body into a `RawSecret`, applying the
    /// source's key allow-list. An allow-list that filters everything is a
    /// successful fetch contributing zero keys.
    fn decode(&self, source: &SourceDescriptor, body: &[u8]) -> FetchOutcome {
        let manifest: SecretManifest = match serde_json::from_slice(body) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(source = %source.id(), "response body is not a secret object");
                return FetchOutcome::Decode {
                    key: None,
                    message: format!("invalid secret object: {}", err),
                };
            }
        };

        let mut data = HashMap::new();
        for (key, encoded) in manifest.data {
            if !source.selects_key(&key) {
                continue;
            }
            match BASE64.decode(encoded.as_bytes()) {
                Ok(bytes) => {
                    data.insert(key, bytes);
                }
                Err(err) => {
                    warn!(source = %source.id(), key = %key, "secret value is not valid base64");
                    return FetchOutcome::Decode {
                        key: Some(key),
                        message: err.to_string(),
                    };
                }
            }
        }

        FetchOutcome::Success(RawSecret {
            namespace: source.namespace.clone(),
            name: source.name.clone(),
            data,
        })
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").field("retry", &self.retry).finish()
    }
}
