//! JSON-line TCP server for the farm simulation backend.

use tracing::info;
use tracing_subscriber::EnvFilter;

use farm_server::config::Config;
use farm_server::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "starting farm-server on {}:{} (max_clients = {}, data_dir = {})",
        config.bind_addr,
        config.port,
        config.max_clients,
        config.data_dir.display()
    );

    server::run(config).await
}
