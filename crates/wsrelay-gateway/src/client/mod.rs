//! Per-connection relay: identity, mailbox, timed writes, delivery loop.
//!
//! Producers enqueue through [`Client::outbound`] and never touch the
//! network. A single [`Client::run_delivery_loop`] call, made by whoever owns
//! the live transport session, drains the mailbox and writes each message
//! with its own deadline.

mod delivery;
pub mod mailbox;
pub mod scope;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use wsrelay_core::error::Result;
use wsrelay_core::protocol::{JsonCodec, Message, Serializer};

use crate::config::schema::RelaySection;
use crate::obs::metrics::RelayMetrics;
use crate::transport::Endpoint;

pub use delivery::DeliveryState;
pub use mailbox::{MailboxSink, DEFAULT_CAPACITY};
pub use scope::{ScopeEnd, WriteScope};

use mailbox::Mailbox;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fresh connection identifier (UUID v4).
pub fn next_client_id() -> String {
    Uuid::new_v4().to_string()
}

/// Construction knobs for a [`Client`].
#[derive(Clone)]
pub struct ClientOptions {
    pub mailbox_capacity: usize,
    pub write_timeout: Duration,
    pub metrics: Option<Arc<RelayMetrics>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            metrics: None,
        }
    }
}

impl ClientOptions {
    pub fn from_config(relay: &RelaySection) -> Self {
        Self {
            mailbox_capacity: relay.mailbox_capacity,
            write_timeout: Duration::from_millis(relay.write_timeout_ms),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RelayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Delivery-side slot: the mailbox is handed out to exactly one loop.
enum LoopSlot {
    Ready(Mailbox),
    Running,
    Stopped(Option<&'static str>),
}

/// Connection handle: one per logical connection.
pub struct Client {
    id: String,
    endpoint: Arc<dyn Endpoint>,
    serializer: Arc<dyn Serializer>,
    sink: MailboxSink,
    slot: Mutex<LoopSlot>,
    timeout: Duration,
    metrics: Option<Arc<RelayMetrics>>,
}

impl Client {
    /// Bind `endpoint` with the JSON codec, a 16-slot mailbox and a 5s
    /// write timeout.
    pub fn new(endpoint: Arc<dyn Endpoint>) -> Self {
        Self::with_options(endpoint, Arc::new(JsonCodec), ClientOptions::default())
    }

    pub fn with_options(
        endpoint: Arc<dyn Endpoint>,
        serializer: Arc<dyn Serializer>,
        opts: ClientOptions,
    ) -> Self {
        let (sink, mailbox) = mailbox::mailbox(opts.mailbox_capacity);
        Self {
            id: next_client_id(),
            endpoint,
            serializer,
            sink,
            slot: Mutex::new(LoopSlot::Ready(mailbox)),
            timeout: opts.write_timeout,
            metrics: opts.metrics,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Producer view of the mailbox. Messages sent here are written to the
    /// peer in enqueue order.
    ///
    /// Callers must not enqueue after [`Client::close`]; doing so fails with
    /// `MailboxClosed`.
    pub fn outbound(&self) -> MailboxSink {
        self.sink.clone()
    }

    /// Close the mailbox. Already-buffered messages are still delivered,
    /// then the delivery loop returns `Ok(())`. Idempotent.
    pub fn close(&self) {
        self.sink.close();
    }

    /// Write one message to the endpoint, bounded by `timeout`.
    ///
    /// The write ends early with `Cancelled` if `parent` is cancelled. The
    /// endpoint's own error is returned unmodified. No retry.
    pub async fn write_timeout(
        &self,
        parent: &CancellationToken,
        timeout: Duration,
        msg: &Message,
    ) -> Result<()> {
        let scope = WriteScope::new(parent, timeout);
        let payload = self.serializer.serialize(msg)?;
        let kind = self.serializer.frame_kind();

        tokio::select! {
            biased;
            res = self.endpoint.write(&scope, kind, payload) => res,
            end = scope.done() => Err(scope.error(end)),
        }
    }

    fn metrics(&self) -> Option<&RelayMetrics> {
        self.metrics.as_deref()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("pending", &self.sink.pending())
            .finish_non_exhaustive()
    }
}
