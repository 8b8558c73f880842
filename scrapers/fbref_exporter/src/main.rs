use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fbref_exporter::{
    config::ExporterConfig,
    metrics::Publisher,
    scheduler::Scheduler,
    web::{self, AppState},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Premier League stats exporter for Prometheus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape on a schedule and serve /metrics (default)
    Serve,
    /// Extract metrics from a saved HTML page and print them
    ParseFile {
        /// Path to the HTML file to process
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Run a single scrape cycle and print the resulting metrics
    ScrapeOnce,
}

async fn serve(config: ExporterConfig) -> Result<()> {
    let addr = config.server.socket_addr()?;
    let listener = match web::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };
    info!("Starting Premier League metrics exporter on {}", addr);

    let publisher = Arc::new(Publisher::new()?);
    let scheduler = Scheduler::new(&config, publisher.clone())?.spawn();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    let served = web::serve(listener, AppState { publisher }, shutdown).await;

    scheduler.stop().await;
    served
}

fn parse_file(config: &ExporterConfig, file: &Path) -> Result<()> {
    let html = fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    info!("Processing {:?}", file);

    let publisher = Arc::new(Publisher::new()?);
    let scheduler = Scheduler::new(config, publisher.clone())?;
    let counts = scheduler.process_html(&html)?;
    info!(
        "Extracted {} players, {} teams, {} goalkeepers",
        counts.players, counts.teams, counts.goalkeepers
    );

    print!("{}", publisher.render()?);
    Ok(())
}

async fn scrape_once(config: &ExporterConfig) -> Result<()> {
    let publisher = Arc::new(Publisher::new()?);
    let scheduler = Scheduler::new(config, publisher.clone())?;

    let report = scheduler.run_cycle().await;
    print!("{}", publisher.render()?);

    match report.error {
        Some(e) => anyhow::bail!("Scrape failed: {}", e),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ExporterConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::ParseFile { file } => parse_file(&config, &file),
        Commands::ScrapeOnce => scrape_once(&config).await,
    }
}
