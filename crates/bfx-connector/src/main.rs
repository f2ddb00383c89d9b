//! Bitfinex market-data connector - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Bitfinex market-data connector
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via BFX_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    bfx_ws::init_crypto();

    let args = Args::parse();

    bfx_connector::init_logging()?;

    info!("Starting bfx-connector v{}", env!("CARGO_PKG_VERSION"));

    let config = bfx_connector::AppConfig::load(args.config)?;
    info!(
        ws_url = %config.websocket.url,
        api_port = config.api.port,
        subscriptions = config.subscriptions.len(),
        "Configuration loaded"
    );

    let app = bfx_connector::Application::new(config)?;
    app.run().await?;

    Ok(())
}
