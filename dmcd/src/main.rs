//! dmcd — DLNA media controller daemon.
//!
//! Wires the pieces together: configuration, scheduler, player manager with
//! periodic discovery, media server client, dispatcher and the HTTP surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use dmcconfig::Config;
use dmccontrol::{MediaServer, PlayerDispatcher, PlayerManager, Scheduler};
use dmcserver::{AppInfo, WebServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let config = Config::find_and_load("").context("failed to load config.json")?;

    let appinfo = Arc::new(AppInfo::new(
        dmcserver::APP_NAME,
        env!("CARGO_PKG_VERSION"),
    ));
    appinfo.register_value(
        "config",
        serde_json::to_value(&config).context("config is not serializable")?,
    );

    info!("starting");
    let scheduler = Scheduler::new();

    let manager = PlayerManager::new(&config.players);
    manager.start_discovery(&scheduler);
    {
        let manager = Arc::clone(&manager);
        appinfo.register_provider("players", move || {
            serde_json::to_value(manager.player_views()).unwrap_or_default()
        });
    }

    let media_server = config
        .media_servers
        .first()
        .map(MediaServer::from_config)
        .context("no media server configured")?;

    let dispatcher = Arc::new(PlayerDispatcher::new(
        Arc::clone(&manager),
        Arc::new(media_server),
        Arc::clone(&scheduler),
    ));

    let server = WebServer::new(config.webserver_port, config.webserver_cors_allow);
    server.serve(dispatcher, appinfo).await?;

    info!("shutting down");
    scheduler.shutdown();
    Ok(())
}
