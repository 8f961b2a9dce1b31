//! feedmon - on-chain price feed monitor entry point.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// On-chain price feed monitor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FEEDMON_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    feedmon_telemetry::init_logging()?;

    info!("Starting feedmon v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > FEEDMON_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("FEEDMON_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = feedmon_bot::AppConfig::from_file(&config_path)?;
    info!(
        network = %config.solana.network_name,
        rpc_endpoint = %config.solana.rpc_endpoint,
        "Configuration loaded"
    );

    let app = feedmon_bot::Application::new(config)?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    app.run(token).await?;

    info!("feedmon stopped");
    Ok(())
}
