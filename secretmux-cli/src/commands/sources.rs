use anyhow::Result;
use tabled::Tabled;

use crate::config::CliConfig;
use crate::output;
use secretmux::Fetcher;

#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "SOURCE")]
    source: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "KEYS")]
    keys: String,
}

/// Fetch every configured source once and report its status.
pub async fn run(config: &CliConfig) -> Result<()> {
    let transport = config.build_transport()?;
    let fetcher = Fetcher::new(transport, config.resolver.retry.clone());

    let mut rows = Vec::new();
    for source in &config.resolver.sources {
        let source_id = source.id();
        let outcome = fetcher.fetch(source).await;
        let (status, keys) = match outcome.into_result(&source_id) {
            Ok(secret) => ("ok".to_string(), secret.data.len().to_string()),
            Err(err) => (err.to_string(), "-".to_string()),
        };
        rows.push(SourceRow {
            source: source_id,
            status,
            keys,
        });
    }

    output::print_table(rows);
    Ok(())
}
