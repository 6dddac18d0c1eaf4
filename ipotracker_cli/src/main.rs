mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ipotracker_lib::PipelineConfig;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "ipotracker")]
#[command(about = "Collect, reconcile and query IPO listings from IPO Scoop")]
struct Cli {
    /// Output format: table, json, csv, md or envelope
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// SQLite database path (overrides IPO_DATABASE_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Blob bucket directory (overrides IPO_BUCKET_DIR)
    #[arg(long, global = true)]
    bucket: Option<PathBuf>,

    /// Listing site root (overrides IPO_SOURCE_URL)
    #[arg(long, global = true)]
    source_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape both listing pages and upload them as CSV blobs
    Collect,
    /// Apply pending blobs to the database
    Reconcile(commands::reconcile::ReconcileArgs),
    /// Collect, then reconcile
    Run(commands::reconcile::ReconcileArgs),
    /// Print recent or upcoming IPOs
    Query(commands::query::QueryArgs),
    /// Serve the queries over HTTP
    Serve {
        /// Listen address (overrides IPO_QUERY_ADDR)
        #[arg(long)]
        addr: Option<std::net::SocketAddr>,
    },
}

impl Cli {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_env()?;
        if let Some(ref db) = self.db {
            config.database_path = db.clone();
        }
        if let Some(ref bucket) = self.bucket {
            config.bucket_dir = bucket.clone();
        }
        if let Some(ref url) = self.source_url {
            config.source_url = url.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ipotracker=info".parse()?)
                .add_directive("ipotracker_lib=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.output);
    let mut config = cli.config()?;

    match &cli.command {
        Commands::Collect => {
            commands::collect::run(&config).await?;
        }
        Commands::Reconcile(args) => commands::reconcile::run(args, &config)?,
        Commands::Run(args) => commands::run::run(args, &config).await?,
        Commands::Query(args) => commands::query::run(args, &config, &format)?,
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.query_addr = *addr;
            }
            commands::serve::run(&config).await?
        }
    }

    Ok(())
}
