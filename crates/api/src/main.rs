//! Bedwatch - Main Entry Point

use api::{init_logging, run_server, ServiceConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("BEDWATCH_CONFIG").unwrap_or_else(|_| "bedwatch".to_string());
    let config = ServiceConfig::load(Some(&config_path))?;

    init_logging(&config.server.log_level, config.server.log_json);

    info!("=== Bedwatch v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Starting bed monitoring service...");

    run_server(config).await
}
