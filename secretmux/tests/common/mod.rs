//! Shared helpers for resolver integration tests.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secretmux::{ResolverConfig, RetryPolicy, SourceDescriptor};
use serde_json::json;

/// Encode a secret manifest body the way the API server would return it.
pub fn secret_body(pairs: &[(&str, &str)]) -> Vec<u8> {
    let data: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(BASE64.encode(v))))
        .collect();
    serde_json::to_vec(&json!({
        "kind": "Secret",
        "apiVersion": "v1",
        "metadata": {"name": "ignored", "namespace": "ignored"},
        "type": "Opaque",
        "data": data,
    }))
    .unwrap()
}

/// A resolver configuration with fast retries and short timeouts.
pub fn fast_config(sources: Vec<SourceDescriptor>) -> ResolverConfig {
    let mut config = ResolverConfig::new(sources);
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter_ms: 0,
    };
    config.fetch_timeout_secs = 5;
    config.refresh_timeout_secs = 5;
    config
}
