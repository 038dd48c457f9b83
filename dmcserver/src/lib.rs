//! # dmcserver - HTTP surface
//!
//! Thin axum layer over the dispatcher: `/play`, `/pause`, `/stop`,
//! `/state`, `/info` and `/exit`. The control plane underneath is
//! synchronous and may block on renderer I/O (probes, Wake-on-LAN,
//! transport settling), so every dispatcher call runs on the blocking pool.

pub mod appinfo;
mod routes;

pub use appinfo::AppInfo;
pub use routes::{AppState, build_router};

use std::sync::Arc;

use dmccontrol::PlayerDispatcher;
use tokio::sync::mpsc;
use tracing::info;

pub const APP_NAME: &str = "DLNA Media Controller";

pub struct WebServer {
    port: u16,
    cors_allow: bool,
}

impl WebServer {
    pub fn new(port: u16, cors_allow: bool) -> Self {
        Self { port, cors_allow }
    }

    /// Serves until `/exit` is called or the process receives Ctrl-C.
    pub async fn serve(
        &self,
        dispatcher: Arc<PlayerDispatcher>,
        appinfo: Arc<AppInfo>,
    ) -> std::io::Result<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let state = AppState {
            dispatcher,
            appinfo,
            shutdown: shutdown_tx,
        };
        let app = build_router(state, self.cors_allow);

        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!("Starting {} on port {}", APP_NAME, self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => info!("shutdown requested via /exit"),
                    _ = tokio::signal::ctrl_c() => info!("shutdown requested via signal"),
                }
            })
            .await
    }
}
