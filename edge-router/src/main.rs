//! edge-router: edge request router server
//!
//! Usage: `edge-router [config.toml]`

use edge_router::config::{LogFormat, LoggingConfig};
use edge_router::{EdgeServer, RouterConfig};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = RouterConfig::load(config_path.as_deref().map(Path::new))?;

    init_logging(&config.logging);

    info!("Starting edge-router v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration loaded from {} and environment", path),
        None => info!("No config file specified, using defaults and environment"),
    }

    let server = EdgeServer::new(config)?;
    server.run().await?;

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "edge_router={level},tower_http={level}",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
