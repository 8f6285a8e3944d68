use anyhow::Result;
use serde_json::json;
use tabled::Tabled;

use crate::config::CliConfig;
use crate::output;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "SOURCE")]
    source: String,
    #[tabled(rename = "COLLIDED")]
    collided: String,
}

/// Refresh once and print the merged view.
pub async fn run(config: &CliConfig, reveal: bool, format: &str) -> Result<()> {
    let resolver = config.build_resolver()?;
    let report = resolver.refresh().await?;

    for failure in &report.failures {
        output::print_warning(&format!("{}: {}", failure.source_id, failure.error));
    }

    let view = resolver.snapshot().await?;
    let mut entries: Vec<_> = view.iter().collect();
    entries.sort_by_key(|(key, _)| key.to_string());

    if format == "json" {
        let mut map = serde_json::Map::new();
        for (key, entry) in entries {
            map.insert(
                key.to_string(),
                json!({
                    "value": output::display_value(&entry.value, reveal),
                    "source": entry.source_id,
                    "collided": entry.collided,
                }),
            );
        }
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    let rows: Vec<EntryRow> = entries
        .into_iter()
        .map(|(key, entry)| EntryRow {
            key: key.to_string(),
            value: output::display_value(&entry.value, reveal),
            source: entry.source_id.clone(),
            collided: if entry.collided {
                "yes".to_string()
            } else {
                String::new()
            },
        })
        .collect();
    output::print_table(rows);

    for record in view.real_collisions() {
        let losers: Vec<String> = record
            .contenders
            .iter()
            .filter(|contender| **contender != record.winner)
            .cloned()
            .collect();
        output::print_warning(&format!(
            "collision on '{}': {} won over {}",
            record.key,
            record.winner,
            losers.join(", ")
        ));
    }

    Ok(())
}
