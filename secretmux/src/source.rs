//! Source descriptors and fetched secret payloads

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One secret to fetch, and how its keys enter the merged namespace.
///
/// Descriptors are supplied at construction and stay immutable for the
/// resolver's lifetime; changing the source list means building a new
/// resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Namespace the secret lives in.
    pub namespace: String,
    /// Secret name.
    pub name: String,
    /// Keys to keep from this source. Empty keeps every key.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Override for the prefix (`prefixed` policy) or path segment
    /// (`path-segmented` policy) this source's keys are filed under.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl SourceDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            keys: Vec::new(),
            prefix: None,
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// `namespace/name` identity used in logs, reports, and merged entries.
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// API path of the secret resource.
    pub fn resource_path(&self) -> String {
        format!(
            "/api/v1/namespaces/{}/secrets/{}",
            self.namespace, self.name
        )
    }

    /// Prefix applied by the `prefixed` merge policy: the explicit override,
    /// or `NAME_` derived from the secret name.
    pub fn merge_prefix(&self) -> String {
        match &self.prefix {
            Some(prefix) => prefix.clone(),
            None => format!("{}_", self.name.to_uppercase().replace('-', "_")),
        }
    }

    /// Path segment applied by the `path-segmented` merge policy: the
    /// explicit override, or the secret name.
    pub fn segment(&self) -> &str {
        self.prefix.as_deref().unwrap_or(&self.name)
    }

    /// Whether the allow-list keeps `key`.
    pub fn selects_key(&self, key: &str) -> bool {
        self.keys.is_empty() || self.keys.iter().any(|k| k == key)
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::InvalidConfig(
                "source namespace must not be empty".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(Error::InvalidConfig(
                "source name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decoded payload of one fetched secret. Created per refresh cycle and
/// discarded after the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSecret {
    pub namespace: String,
    pub name: String,
    /// Key to decoded value bytes, post base64.
    pub data: HashMap<String, Vec<u8>>,
}

impl RawSecret {
    /// `namespace/name` identity matching the descriptor it came from.
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Result of fetching one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Secret fetched and fully decoded.
    Success(RawSecret),
    /// The secret does not exist. Not retried.
    NotFound,
    /// Credentials were rejected. Not retried.
    Unauthorized,
    /// Network or server failure, after retries were exhausted when
    /// `retryable`.
    Transport { retryable: bool, message: String },
    /// A payload failed decoding; the source contributes nothing this
    /// cycle. `key` is absent when the response body itself was malformed.
    Decode {
        key: Option<String>,
        message: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Split into the fetched secret or the typed error for `source_id`.
    pub fn into_result(self, source_id: &str) -> Result<RawSecret> {
        match self {
            FetchOutcome::Success(secret) => Ok(secret),
            FetchOutcome::NotFound => Err(Error::NotFound {
                source_id: source_id.to_string(),
            }),
            FetchOutcome::Unauthorized => Err(Error::Unauthorized {
                source_id: source_id.to_string(),
            }),
            FetchOutcome::Transport { retryable, message } => Err(Error::Transport {
                source_id: source_id.to_string(),
                message,
                retryable,
            }),
            FetchOutcome::Decode { key, message } => Err(Error::Decode {
                source_id: source_id.to_string(),
                key,
                message,
            }),
        }
    }
}
