use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use lineup_tracker::analyzer::Analyzer;
use lineup_tracker::client::{ResilientClient, SofaFeed};
use lineup_tracker::config::{AppConfig, CONFIG_PATH};
use lineup_tracker::monitor::Monitor;
use lineup_tracker::notify::{NotificationChannel, NotificationRouter, WebhookChannel};
use lineup_tracker::roster::load_roster;

#[derive(Parser)]
#[command(name = "monitor", about = "Fantasy lineup monitoring daemon")]
struct Args {
    /// Path to the config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Path to the roster CSV file
    #[arg(long, default_value = "my_roster.csv")]
    roster: PathBuf,

    /// Run a single monitoring cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;
    info!("loaded config from {}", args.config.display());

    let roster = load_roster(&args.roster)?;

    let feed = Arc::new(SofaFeed::new(
        &config.api.base_url,
        Duration::from_secs(config.api.timeout_seconds),
    )?);
    let client = Arc::new(ResilientClient::new(feed, &config));

    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
    let webhook_url = config
        .notifications
        .webhook_url
        .clone()
        .or_else(|| std::env::var(lineup_tracker::WEBHOOK_URL_ENV).ok());
    match webhook_url {
        Some(url) => channels.push(Arc::new(WebhookChannel::new("chat", url)?)),
        None => warn!("no webhook configured; alerts will be logged only"),
    }
    let router = Arc::new(NotificationRouter::new(channels));

    if client.probe().await {
        info!("upstream connectivity confirmed");
    } else {
        warn!("upstream connectivity probe failed; continuing anyway");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut monitor = Monitor::new(
        Arc::clone(&client),
        router,
        Analyzer::default(),
        roster,
        config.monitoring.clone(),
        config.notifications.clone(),
        shutdown_rx,
    );

    if args.once {
        let outcome = monitor.run_once().await?;
        info!(
            "cycle complete: {} checks, {} alerts",
            outcome.matches_checked, outcome.alerts_sent
        );
        client.close();
        return Ok(());
    }

    info!("entering monitoring loop. Press Ctrl+C to stop.");
    let handle = tokio::spawn(monitor.run());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}
