//! Tap Marketo - Singer tap for Marketo

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tap_common::logging::{init_logging, LogConfig};
use tap_common::{Catalog, SingerWriter, State};
use tap_marketo::{sync, Config, HttpClient, SyncContext, SyncSettings, SystemClock};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tap-marketo")]
#[command(author, version, about = "Singer tap for Marketo")]
struct Cli {
    /// Tap configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Catalog of streams to sync
    #[arg(long, alias = "properties")]
    catalog: PathBuf,

    /// State file from a previous run
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let log_config = LogConfig::for_tap("tap-marketo")
        .verbose(cli.verbose)
        .with_env()?;
    init_logging(&log_config)?;

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let catalog = Catalog::from_file(&cli.catalog)
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let mut state = match &cli.state {
        Some(path) => State::from_file(path)
            .with_context(|| format!("loading state {}", path.display()))?,
        None => State::default(),
    };

    let client = HttpClient::connect(&config).await?;
    let use_corona = match config.use_corona {
        Some(configured) => configured,
        None => client.detect_corona().await?,
    };
    info!(use_corona, calls_made = client.calls_made(), "Connected to Marketo");

    let settings = SyncSettings::from_config(&config, use_corona)?;
    let mut output = SingerWriter::stdout();
    let clock = SystemClock;
    let mut ctx = SyncContext::new(&client, &mut output, &clock, settings);

    let summary = sync(&mut ctx, &catalog, &mut state).await?;

    for stream in &summary.streams {
        info!(stream = %stream.stream, records = stream.record_count, "Stream summary");
    }
    if summary.streams.is_empty() {
        warn!("No streams selected");
    }
    info!(
        records = summary.total_records(),
        calls_made = client.calls_made(),
        "Sync complete"
    );
    Ok(())
}
