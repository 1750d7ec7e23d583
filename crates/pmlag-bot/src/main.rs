//! pmlag - Polymarket leader/lagger momentum trigger bot - Entry Point
//!
//! Observation mode: triggers are evaluated and logged, no orders.
//! Trading mode: a fire buys the lagger and optionally cashes out.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Polymarket leader/lagger momentum trigger bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "PMLAG_CONFIG", default_value = "config/default.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    pmlag_ws::init_crypto();

    let args = Args::parse();

    pmlag_telemetry::init_logging()?;

    info!("Starting pmlag v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %args.config, "Loading configuration");

    let config = pmlag_bot::AppConfig::load(&args.config)?;
    info!(
        mode = ?config.execution.mode,
        leader = %config.instruments.leader,
        lagger = %config.instruments.lagger,
        "Configuration loaded"
    );

    let mut app = pmlag_bot::Application::new(config.clone())?;
    if config.is_trading() {
        let credentials = pmlag_bot::TradingCredentials::from_env()?;
        let venue = pmlag_bot::Application::connect_venue(&config, credentials).await?;
        app = app.with_venue(venue);
    }

    app.run().await?;

    Ok(())
}
