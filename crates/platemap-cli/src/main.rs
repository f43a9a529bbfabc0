use std::path::PathBuf;

use clap::{Parser, Subcommand};
use platemap_resolver::{resolve_selection, CandidateRecord, Resolution, Resolver, ResolverConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "platemap")]
#[command(about = "Resolve free-text restaurant input into a structured record")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve free text (a name, social link, or description) into a
    /// record or a candidate list.
    Resolve { text: String },
    /// Pick one candidate from a previously returned ambiguous result.
    Select {
        /// JSON file holding the candidate array from a `resolve` run.
        #[arg(long)]
        candidates: PathBuf,
        index: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Resolve { text } => {
            let config = ResolverConfig::from_env()?;
            let resolver = Resolver::new(config)?;
            let resolution = resolver.resolve(&text).await?;
            match &resolution {
                Resolution::Resolved { record } => {
                    tracing::info!(name = %record.name, "resolved");
                }
                Resolution::Ambiguous { candidates } => {
                    tracing::info!(count = candidates.len(), "ambiguous, pick with `select`");
                }
            }
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Commands::Select { candidates, index } => {
            let raw = std::fs::read_to_string(&candidates)?;
            let candidates: Vec<CandidateRecord> = serde_json::from_str(&raw)?;
            let record = resolve_selection(&candidates, index)?;
            tracing::info!(name = %record.name, "candidate selected");
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
