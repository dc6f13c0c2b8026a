//! Shared application state for the wsRelay gateway.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use wsrelay_core::error::Result;
use wsrelay_core::protocol::JsonCodec;

use crate::client::ClientOptions;
use crate::config::RelayConfig;
use crate::obs::RelayMetrics;
use crate::registry::ClientRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: RelayConfig,
    registry: ClientRegistry,
    metrics: Arc<RelayMetrics>,
    codec: Arc<JsonCodec>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl AppState {
    /// Build application state. Configs built in code are validated here too.
    pub fn new(cfg: RelayConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry: ClientRegistry::new(),
                metrics: Arc::new(RelayMetrics::default()),
                codec: Arc::new(JsonCodec),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        })
    }

    pub fn cfg(&self) -> &RelayConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn codec(&self) -> Arc<JsonCodec> {
        Arc::clone(&self.inner.codec)
    }

    /// Root supervising token; every session runs under a child of it.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Tracks live sessions so shutdown can wait for them.
    pub fn tracker(&self) -> &TaskTracker {
        &self.inner.tracker
    }

    /// Options for a new client, wired to this state's metrics.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::from_config(&self.inner.cfg.relay).with_metrics(self.metrics())
    }
}
