//! Resolver configuration
//!
//! Static configuration supplied at construction: sources, merge policy,
//! retry behavior, timeouts, concurrency, and the optional refresh
//! schedule. Credentials (endpoint, token, CA bundle) belong to the
//! transport, not here; the hosting environment resolves those.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::merge::{MergePolicy, Precedence};
use crate::source::SourceDescriptor;

/// Retry policy for transient transport failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per fetch, including the first.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds, doubled per attempt.
    pub base_delay_ms: u64,
    /// Upper cap for a single backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Maximum random delay added on top of each backoff, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            jitter_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next try, after `attempt` (1-based) failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(backoff + jitter)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Static resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Secrets to aggregate, in configuration order. With the default
    /// precedence, later entries win contested keys.
    pub sources: Vec<SourceDescriptor>,
    /// How raw keys map into the merged namespace.
    #[serde(default)]
    pub policy: MergePolicy,
    /// Which end of the source list wins contested keys.
    #[serde(default)]
    pub precedence: Precedence,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Per-fetch timeout in seconds, enforced by the transport.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Deadline for one whole refresh cycle in seconds.
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
    /// Interval for periodic refresh in seconds. Unset means on-demand
    /// refresh only.
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    /// Maximum fetches in flight during one refresh cycle.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_refresh_timeout() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    8
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            policy: MergePolicy::default(),
            precedence: Precedence::default(),
            retry: RetryPolicy::default(),
            fetch_timeout_secs: default_fetch_timeout(),
            refresh_timeout_secs: default_refresh_timeout(),
            refresh_interval_secs: None,
            max_concurrent_fetches: default_max_concurrent(),
        }
    }
}

impl ResolverConfig {
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one source is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.id()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate source '{}'",
                    source.id()
                )));
            }
        }
        self.retry.validate()?;
        if self.fetch_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "refresh_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.refresh_interval_secs == Some(0) {
            return Err(Error::InvalidConfig(
                "refresh_interval_secs must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
