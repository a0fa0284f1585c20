mod analyzer;
mod app;
mod config;
mod db;
mod espn;
mod logger;
mod models;
mod retry;

use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(name = "courtwire")]
#[command(about = "NBA news and injury ingestion for fantasy basketball")]
struct Cli {
    /// Skip AI player extraction and categorization (for debugging)
    #[arg(long)]
    no_ai: bool,

    /// Delete stored news published more than this many days ago
    #[arg(long, default_value_t = 30)]
    retention_days: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    app::run(cli.no_ai, cli.retention_days).await
}
