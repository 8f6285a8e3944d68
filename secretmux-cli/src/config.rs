//! CLI configuration management
//!
//! The CLI is the hosting environment: it reads the bearer token and CA
//! bundle from the filesystem and hands the resolver opaque values. The
//! library itself never touches a path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use secretmux::{HttpTransport, Resolver, ResolverConfig, Transport};

/// On-disk CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// API server endpoint, e.g. `https://10.0.0.1:6443`.
    pub endpoint: String,
    /// File containing the bearer token.
    pub token_file: PathBuf,
    /// File containing the PEM CA bundle the server is validated against.
    pub ca_file: PathBuf,
    /// Resolver settings: sources, policy, retry, timeouts.
    #[serde(flatten)]
    pub resolver: ResolverConfig,
}

impl CliConfig {
    /// Load configuration from `path`, or the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: CliConfig = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        Ok(config)
    }

    fn default_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config/secretmux/config.toml"))
    }

    /// Build the transport, reading credentials from the referenced files.
    pub fn build_transport(&self) -> Result<Arc<dyn Transport>> {
        let token = std::fs::read_to_string(&self.token_file)
            .with_context(|| format!("failed to read token file {}", self.token_file.display()))?;
        let ca_bundle = std::fs::read(&self.ca_file)
            .with_context(|| format!("failed to read CA bundle {}", self.ca_file.display()))?;

        let transport = HttpTransport::new(
            &self.endpoint,
            token.trim(),
            &ca_bundle,
            Duration::from_secs(self.resolver.fetch_timeout_secs),
        )?;
        Ok(Arc::new(transport))
    }

    /// Build a resolver over the configured transport.
    pub fn build_resolver(&self) -> Result<Resolver> {
        let transport = self.build_transport()?;
        Ok(Resolver::new(self.resolver.clone(), transport)?)
    }
}
