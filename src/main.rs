use std::path::PathBuf;

use tokio::net::TcpListener;

use relay_gateway::config::loader::{self, ConfigError};
use relay_gateway::config::watcher::ConfigWatcher;
use relay_gateway::config::GatewayConfig;
use relay_gateway::lifecycle::{signals, Shutdown};
use relay_gateway::observability;
use relay_gateway::GatewayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gateway.json"));

    // An unreadable or unwritable config location is fatal; a file that is
    // merely invalid falls back to the built-in defaults.
    let (config, load_warning) = match loader::load_or_create(&config_path) {
        Ok(config) => (config, None),
        Err(e @ ConfigError::Io(_)) => return Err(e.into()),
        Err(e) => (GatewayConfig::default(), Some(e.to_string())),
    };

    observability::logging::init(&config.observability.log_level);

    tracing::info!("relay-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(warning) = load_warning {
        tracing::warn!(path = ?config_path, "{warning}; continuing with built-in defaults");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        target = %config.target.origin(),
        proxy = %format!("{}:{}", config.upstream_proxy.host, config.upstream_proxy.port),
        header_mode = ?config.forwarding.header_mode,
        forward_deadline_secs = config.timeouts.forward_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (watcher, config_updates) = ConfigWatcher::new(&config_path);
    let _watcher_guard = watcher.run()?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            signals::watch_signals(&shutdown).await;
        });
    }

    let server = GatewayServer::new(config, config_path);
    server
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
