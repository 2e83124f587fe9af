//! riskctl-bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Brokerage risk-control enforcement service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RISKCTL_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    riskctl_telemetry::init_logging()?;

    info!("Starting riskctl-bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > RISKCTL_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("RISKCTL_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = riskctl_bot::AppConfig::from_file(&config_path)?;
    info!(
        timezone = %config.session.timezone,
        fan_out = config.jobs.fan_out,
        "Configuration loaded"
    );

    let app = riskctl_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
