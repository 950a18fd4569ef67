//! tickwatch price-alert service - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Streams live quotes and fires price alerts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "TICKWATCH_CONFIG", default_value = "config/default.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tickwatch_telemetry::init_logging()?;

    info!("Starting tickwatch v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %args.config, "Loading configuration");

    let config = tickwatch_app::AppConfig::load(&args.config)?;
    info!(
        base_url = %config.stream.base_url,
        rules = config.alerts.rules.len(),
        "Configuration loaded"
    );

    let app = tickwatch_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
