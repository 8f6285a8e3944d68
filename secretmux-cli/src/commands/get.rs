use std::io::Write;

use anyhow::Result;
use tracing::info;

use crate::config::CliConfig;

/// Refresh once and print one resolved value to stdout.
pub async fn run(config: &CliConfig, key: &str) -> Result<()> {
    let resolver = config.build_resolver()?;
    resolver.refresh().await?;

    let entry = resolver.get(key).await?;
    info!(key, source = %entry.source_id, "resolved");

    match std::str::from_utf8(&entry.value) {
        Ok(text) => println!("{}", text),
        Err(_) => {
            // Binary value: write the raw bytes, no trailing newline.
            std::io::stdout().write_all(&entry.value)?;
        }
    }
    Ok(())
}
