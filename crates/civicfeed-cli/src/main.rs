mod feeds;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "civicfeed")]
#[command(about = "Fetch and normalize public-safety incident feeds")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List configured feed sources
    Sources,
    /// Fetch a source's live feed and print the normalized batch as JSON
    Fetch {
        /// Source slug from the sources file
        slug: String,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Normalize a feed body saved to disk
    Process {
        /// Source slug whose profile is applied
        slug: String,
        /// Path to the saved feed body
        file: PathBuf,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = civicfeed_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(env = %config.env, sources = %config.sources_path.display(), "configuration loaded");

    match cli.command {
        Commands::Sources => feeds::run_sources(&config),
        Commands::Fetch { slug, pretty } => feeds::run_fetch(&config, &slug, pretty).await,
        Commands::Process { slug, file, pretty } => {
            feeds::run_process(&config, &slug, &file, pretty).await
        }
    }
}
