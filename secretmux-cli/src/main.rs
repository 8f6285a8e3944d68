//! Secretmux CLI
//!
//! Inspects and aggregates remote secret sources from the command line.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the configuration file (default: ~/.config/secretmux/config.toml)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every configured source and report its status
    Sources,
    /// Refresh once and print the merged view
    Dump {
        /// Print secret values instead of redacting them
        #[arg(long)]
        reveal: bool,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Refresh once and print one resolved value
    Get {
        /// Resolved key to look up
        key: String,
    },
    /// Refresh once and print the merged view as dotenv lines
    Render,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sources => commands::sources::run(&config).await,
        Commands::Dump { reveal, output } => commands::dump::run(&config, reveal, &output).await,
        Commands::Get { key } => commands::get::run(&config, &key).await,
        Commands::Render => commands::render::run(&config).await,
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so command output stays pipeable.
    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}
