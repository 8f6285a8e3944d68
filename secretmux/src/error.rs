//! Error types for secret aggregation
//!
//! Every failure the resolver can surface is a variant here, so callers can
//! tell retryable transport trouble apart from terminal credential or
//! decoding problems.

use thiserror::Error;

/// Errors surfaced by the resolver and its collaborators
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Credentials were rejected (401/403). Not retried; the bearer token
    /// must be refreshed by the hosting environment.
    #[error("unauthorized for secret '{source_id}'")]
    Unauthorized { source_id: String },

    /// The named secret does not exist. Not retried.
    #[error("secret not found: '{source_id}'")]
    NotFound { source_id: String },

    /// Network or server-side failure. Retried per policy when `retryable`.
    #[error("transport error for '{source_id}': {message}")]
    Transport {
        source_id: String,
        message: String,
        retryable: bool,
    },

    /// A secret payload could not be decoded. Fatal for that source only;
    /// `key` is absent when the response body itself was malformed.
    #[error("failed to decode secret '{source_id}': {message}")]
    Decode {
        source_id: String,
        key: Option<String>,
        message: String,
    },

    /// Lookup before the first successful refresh.
    #[error("no merged view published yet")]
    NotReady,

    /// Lookup of a resolved key the merged view does not contain.
    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A refresh cycle in which no source contributed anything.
    #[error("refresh failed: {0}")]
    RefreshFailed(String),

    /// The refresh deadline elapsed before every fetch completed.
    #[error("refresh deadline of {0}s exceeded")]
    DeadlineExceeded(u64),
}

impl Error {
    /// Whether retrying the failed operation may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { retryable: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let transient = Error::Transport {
            source_id: "default/db".to_string(),
            message: "connection reset".to_string(),
            retryable: true,
        };
        assert!(transient.is_retryable());

        let rejected = Error::Unauthorized {
            source_id: "default/db".to_string(),
        };
        assert!(!rejected.is_retryable());

        let missing = Error::NotFound {
            source_id: "default/db".to_string(),
        };
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_display_includes_source() {
        let err = Error::Decode {
            source_id: "prod/api-keys".to_string(),
            key: Some("TLS_CERT".to_string()),
            message: "invalid padding".to_string(),
        };
        assert!(err.to_string().contains("prod/api-keys"));
    }
}
