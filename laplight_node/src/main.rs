//! LapLight Node - live race tracker for an LED track map
//!
//! Boots the clock from SNTP, loads the roster over HTTP, then runs two
//! tasks until interrupted:
//! - **ingest**: pulls a location batch every second
//! - **render**: paints every car onto the strip at the render rate

mod config;
mod sink;

use anyhow::{anyhow, Result};
use clap::Parser;
use laplight_core::{StripRenderer, TrackerNode};
use laplight_env::{HttpFeed, RaceContext, SntpClient, TokioContext};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::NodeConfig;
use crate::sink::LogSink;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::parse();
    
    // RUST_LOG wins over --verbose
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;
    
    info!("LapLight Node v{}", env!("CARGO_PKG_VERSION"));
    info!("roster: {} | locations: {}", config.roster_url, config.locations_url);
    
    let context = TokioContext::shared();
    let feed = Arc::new(
        HttpFeed::new(&config.roster_url, &config.locations_url)?.with_timeout(config.fetch_timeout()),
    );
    let time_server = SntpClient::new(&config.ntp_server);
    
    let node = Arc::new(
        TrackerNode::bootstrap(context.clone(), config.tracker_config(), feed.as_ref(), &time_server).await,
    );
    
    context.spawn("ingest", {
        let node = node.clone();
        let feed = feed.clone();
        async move { node.run_ingest(feed.as_ref()).await }
    });
    
    context.spawn("render", {
        let node = node.clone();
        let renderer = StripRenderer::new(node.config().led_count);
        let mut sink = LogSink::new();
        async move { node.run_render(&renderer, &mut sink).await }
    });
    
    tokio::signal::ctrl_c().await?;
    
    let totals = node.stats().totals();
    info!(
        "shutting down: {} batches, {} fetch failures, {} samples inserted, {} dropped",
        totals.batches,
        totals.fetch_failures,
        totals.samples.inserted,
        totals.samples.dropped()
    );
    Ok(())
}
