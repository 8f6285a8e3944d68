//! Transport to the secrets API
//!
//! `Transport` is the seam between the fetcher and the network: one
//! authenticated GET, with failures already classified into the error
//! taxonomy. `HttpTransport` speaks TLS with a pinned trust anchor;
//! `MemoryTransport` serves canned responses for tests and local
//! development.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};

/// Executes one authenticated GET against the API server.
///
/// Implementations are stateless per call and safe to share across
/// concurrent fetches. `source_id` is the `namespace/name` identity used
/// for error context only.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, source_id: &str) -> Result<Vec<u8>>;
}

/// Transport over HTTPS with bearer-token auth and a pinned CA bundle.
///
/// TLS validation is always on. The built-in root store is disabled, so the
/// server must present a chain to the supplied trust anchor.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl HttpTransport {
    /// Build a transport for `endpoint`, trusting only `ca_bundle_pem`,
    /// with `timeout` applied per call.
    pub fn new(
        endpoint: &str,
        token: impl Into<String>,
        ca_bundle_pem: &[u8],
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::InvalidConfig(format!("invalid endpoint: {}", e)))?;
        if endpoint.scheme() != "https" {
            return Err(Error::InvalidConfig(format!(
                "endpoint must use https, got '{}'",
                endpoint.scheme()
            )));
        }

        let anchor = reqwest::Certificate::from_pem(ca_bundle_pem)
            .map_err(|e| Error::InvalidConfig(format!("invalid CA bundle: {}", e)))?;

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(anchor)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            token: token.into(),
        })
    }

    /// Map a non-success HTTP status into the error taxonomy.
    fn classify_status(status: StatusCode, source_id: &str) -> Error {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized {
                source_id: source_id.to_string(),
            },
            StatusCode::NOT_FOUND => Error::NotFound {
                source_id: source_id.to_string(),
            },
            status => Error::Transport {
                source_id: source_id.to_string(),
                message: format!("HTTP {}", status),
                retryable: status.is_server_error(),
            },
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, source_id: &str) -> Result<Vec<u8>> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("invalid resource path: {}", e)))?;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| Error::Transport {
                source_id: source_id.to_string(),
                message: e.to_string(),
                // Connect failures, DNS trouble, and timeouts are all worth
                // another attempt.
                retryable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(status, source_id));
        }

        let body = response.bytes().await.map_err(|e| Error::Transport {
            source_id: source_id.to_string(),
            message: format!("failed to read response body: {}", e),
            retryable: true,
        })?;

        Ok(body.to_vec())
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

/// In-memory transport for tests and local development.
///
/// Serves canned bodies per path, optionally preceded by a scripted
/// sequence of outcomes, and records how often each path was requested.
#[derive(Default)]
pub struct MemoryTransport {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, Error>>,
    scripts: Mutex<HashMap<String, VecDeque<Result<Vec<u8>>>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for every GET of `path`.
    pub fn insert(&self, path: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies
            .lock()
            .expect("memory transport poisoned")
            .insert(path.into(), body.into());
    }

    /// Fail every GET of `path` with `error`.
    pub fn fail(&self, path: impl Into<String>, error: Error) {
        self.failures
            .lock()
            .expect("memory transport poisoned")
            .insert(path.into(), error);
    }

    /// Script a sequence of outcomes for `path`, consumed before the
    /// steady-state body or failure.
    pub fn script(&self, path: impl Into<String>, outcomes: Vec<Result<Vec<u8>>>) {
        self.scripts
            .lock()
            .expect("memory transport poisoned")
            .insert(path.into(), outcomes.into());
    }

    /// Delay every response, to exercise deadlines.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("memory transport poisoned") = Some(delay);
    }

    /// How often `path` was requested.
    pub fn calls(&self, path: &str) -> usize {
        self.calls
            .lock()
            .expect("memory transport poisoned")
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, path: &str, source_id: &str) -> Result<Vec<u8>> {
        *self
            .calls
            .lock()
            .expect("memory transport poisoned")
            .entry(path.to_string())
            .or_insert(0) += 1;

        let delay = *self.delay.lock().expect("memory transport poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .expect("memory transport poisoned")
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        if let Some(outcome) = scripted {
            return outcome;
        }

        if let Some(error) = self
            .failures
            .lock()
            .expect("memory transport poisoned")
            .get(path)
        {
            return Err(error.clone());
        }

        if let Some(body) = self
            .bodies
            .lock()
            .expect("memory transport poisoned")
            .get(path)
        {
            return Ok(body.clone());
        }

        Err(Error::NotFound {
            source_id: source_id.to_string(),
        })
    }
}
