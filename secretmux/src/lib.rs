//! Secret aggregation resolver
//!
//! Fetches named secret resources from a Kubernetes-style API over
//! bearer-token TLS, decodes their payloads, and merges them into a single
//! flat key-value view under a deterministic collision policy.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use secretmux::{HttpTransport, Resolver, ResolverConfig, SourceDescriptor};
//!
//! let config = ResolverConfig::new(vec![
//!     SourceDescriptor::new("default", "secret1"),
//!     SourceDescriptor::new("default", "secret2"),
//! ]);
//! let transport = HttpTransport::new(
//!     "https://10.0.0.1:6443",
//!     token,
//!     &ca_bundle,
//!     std::time::Duration::from_secs(config.fetch_timeout_secs),
//! )?;
//! let resolver = Resolver::new(config, Arc::new(transport))?;
//!
//! resolver.refresh().await?;
//! let entry = resolver.get("USERNAME").await?;
//! println!("{} came from {}", "USERNAME", entry.source_id);
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod resolver;
pub mod source;
pub mod transport;

// Re-export commonly used types
pub use config::{ResolverConfig, RetryPolicy};
pub use error::{Error, Result};
pub use fetch::Fetcher;
pub use merge::{merge, CollisionRecord, MergePolicy, MergedEntry, MergedView, Precedence};
pub use resolver::{RefreshHandle, RefreshReport, Resolver, SourceFailure};
pub use source::{FetchOutcome, RawSecret, SourceDescriptor};
pub use transport::{HttpTransport, MemoryTransport, Transport};
