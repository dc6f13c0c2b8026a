//! wsRelay gateway binary.
//!
//! - WebSocket endpoint (default `/ws`), one relay client per connection
//! - `/healthz`, `/metrics`
//! - Config from `$WSRELAY_CONFIG` (default `wsrelay.yaml`, defaults if absent)
//! - Ctrl-C cancels every delivery loop, then waits up to the shutdown grace

use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use wsrelay_gateway::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("WSRELAY_CONFIG").unwrap_or_else(|_| "wsrelay.yaml".into());
    let cfg = config::load_or_default(&path)?;
    let listen: SocketAddr = cfg.gateway.listen.parse()?;
    let grace = Duration::from_millis(cfg.relay.shutdown_grace_ms);

    let state = AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, "wsrelay-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    let shutdown = state.shutdown_token().clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    state.tracker().close();
    if tokio::time::timeout(grace, state.tracker().wait()).await.is_err() {
        tracing::warn!(
            remaining = state.registry().len(),
            "shutdown grace elapsed with sessions still open"
        );
    }
    Ok(())
}
