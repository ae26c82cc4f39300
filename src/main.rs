//! abyssd - Abyss IRC Daemon

use abyssd::Server;
use abyssd::config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug_flag = args.iter().any(|a| a == "--debug" || a == "-d");
    let config_path = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .cloned()
        .unwrap_or_else(|| "config.toml".to_string());

    // Read the config before logging is up so `server.debug` can pick the level.
    let loaded = Config::load(&config_path);
    let debug = debug_flag || loaded.as_ref().is_ok_and(|c| c.server.debug);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" })),
        )
        .with_target(true)
        .init();

    let config = loaded.map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    let server = Server::new(config);
    if let Err(e) = server.start().await {
        error!(error = %e, "Startup failed");
        server.stop().await;
        return Err(e);
    }

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    server.stop().await;
    Ok(())
}
