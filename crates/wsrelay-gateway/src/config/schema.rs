use serde::Deserialize;
use wsrelay_core::error::{RelayError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub relay: RelaySection,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            relay: RelaySection::default(),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::UnsupportedVersion);
        }
        self.gateway.validate()?;
        self.relay.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Route the WebSocket upgrade is served on.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(RelayError::BadRequest(format!(
                "gateway.listen must be a socket address, got {:?}",
                self.listen
            )));
        }
        if !self.path.starts_with('/') || self.path.len() < 2 {
            return Err(RelayError::BadRequest(
                "gateway.path must start with '/' and not be the root".into(),
            ));
        }
        if RESERVED_PATHS.contains(&self.path.as_str()) {
            return Err(RelayError::BadRequest(format!(
                "gateway.path {} is reserved for ops endpoints",
                self.path
            )));
        }
        Ok(())
    }
}

const RESERVED_PATHS: [&str; 2] = ["/healthz", "/metrics"];

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_path() -> String {
    "/ws".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    /// Per-connection mailbox size. Fixed for the connection's lifetime.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Deadline for a single transport write.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// How long shutdown waits for live delivery loops.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            write_timeout_ms: default_write_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl RelaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=4096).contains(&self.mailbox_capacity) {
            return Err(RelayError::BadRequest(
                "relay.mailbox_capacity must be between 1 and 4096".into(),
            ));
        }
        if !(100..=60000).contains(&self.write_timeout_ms) {
            return Err(RelayError::BadRequest(
                "relay.write_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if self.shutdown_grace_ms > 60000 {
            return Err(RelayError::BadRequest(
                "relay.shutdown_grace_ms must be at most 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_mailbox_capacity() -> usize {
    16
}
fn default_write_timeout_ms() -> u64 {
    5000
}
fn default_shutdown_grace_ms() -> u64 {
    3000
}
