use anyhow::Result;

use crate::config::CliConfig;
use crate::output;

/// Refresh once and print the merged view as dotenv lines.
pub async fn run(config: &CliConfig) -> Result<()> {
    let resolver = config.build_resolver()?;
    let report = resolver.refresh().await?;

    for failure in &report.failures {
        output::print_warning(&format!("{}: {}", failure.source_id, failure.error));
    }

    let view = resolver.snapshot().await?;
    print!("{}", view.to_dotenv());
    Ok(())
}
