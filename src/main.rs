//! seawatch - Live Maritime Vessel Tracking
//!
//! Connects to a pre-decoded AIS feed, tracks strategically relevant
//! vessels, and publishes batched position snapshots.
//!
//! # Usage
//!
//! ```bash
//! # Live feed (credential from config file or environment)
//! AIS_API_KEY=... seawatch
//!
//! # Explicit config file
//! seawatch --config /etc/seawatch.toml
//!
//! # Simulated fleet only, no upstream connection
//! seawatch --simulate
//! ```
//!
//! # Environment Variables
//!
//! - `AIS_API_KEY`: feed credential (overrides config file)
//! - `AIS_STREAM_ENDPOINT`: feed WebSocket URL (overrides config file)
//! - `SEAWATCH_CONFIG`: path to TOML config file
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use seawatch::{ConnectionManager, TrackerConfig, VesselPipeline};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "seawatch")]
#[command(about = "Live maritime vessel tracking over a decoded AIS feed")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (default: $SEAWATCH_CONFIG, then ./seawatch.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Feed credential; overrides config file and AIS_API_KEY
    #[arg(long)]
    credential: Option<String>,

    /// Feed WebSocket URL; overrides config file and AIS_STREAM_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>,

    /// Snapshot publish interval in milliseconds (clamped to 1000..=60000)
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Publish the simulated fleet without attempting an upstream connection
    #[arg(long)]
    simulate: bool,
}

/// Interval between periodic status lines.
const STATUS_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = TrackerConfig::load(args.config.as_deref())?;
    if let Some(credential) = args.credential {
        config.credential = Some(credential);
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = Some(endpoint);
    }
    if let Some(interval) = args.interval {
        config.update_interval_ms = interval;
    }
    if args.simulate {
        // No credential means the connection manager goes straight to the
        // simulated fleet.
        config.credential = None;
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  seawatch - Live Maritime Vessel Tracking");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        interval_ms = config.update_interval().as_millis() as u64,
        max_confirmed = config.max_confirmed,
        credential = if config.credential.is_some() {
            "configured"
        } else {
            "absent"
        },
        "Configuration loaded"
    );

    let pipeline = VesselPipeline::spawn(&config);
    let mut manager = ConnectionManager::from_config(&config, pipeline.view(), pipeline.commands());
    manager.connect().await;

    // Periodic status line so long-running deployments stay observable.
    let status_view = pipeline.view();
    let status_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(STATUS_INTERVAL_SECS));
        ticker.tick().await; // immediate first tick, skip it
        loop {
            ticker.tick().await;
            let stats = status_view.stats();
            info!(
                state = %status_view.connection_state(),
                simulated = status_view.is_simulated(),
                vessels = status_view.vessels().len(),
                processed = stats.messages_processed,
                dropped = stats.messages_dropped,
                decode_errors = stats.decode_errors,
                "Status"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");
    status_task.abort();
    manager.disconnect().await;
    pipeline.shutdown().await;

    info!("seawatch shutdown complete");
    Ok(())
}
