//! In-memory endpoints for relay tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tokio::sync::{mpsc, Semaphore};

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::{Deserializer, FrameKind, JsonCodec, Message, Serializer};
use wsrelay_gateway::client::{ScopeEnd, WriteScope};
use wsrelay_gateway::transport::Endpoint;

pub fn numbered(n: u64) -> Message {
    Message::new("n", json!(n))
}

/// Decodes every written frame and forwards it to a channel. Optionally each
/// write first waits for a permit from `gate`.
pub struct RecordingEndpoint {
    tx: mpsc::UnboundedSender<Message>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingEndpoint {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, gate: None }), rx)
    }

    pub fn gated() -> (Arc<Self>, mpsc::UnboundedReceiver<Message>, Arc<Semaphore>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        (
            Arc::new(Self {
                tx,
                gate: Some(Arc::clone(&gate)),
            }),
            rx,
            gate,
        )
    }
}

#[async_trait]
impl Endpoint for RecordingEndpoint {
    async fn write(&self, _scope: &WriteScope, kind: FrameKind, payload: Bytes) -> Result<()> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| RelayError::Transport("gate closed".into()))?
                .forget();
        }
        assert_eq!(kind, FrameKind::Text);
        let msg = JsonCodec.deserialize(&payload)?;
        self.tx
            .send(msg)
            .map_err(|_| RelayError::Transport("recorder dropped".into()))
    }
}

/// Never completes a write and ignores its scope.
#[derive(Default)]
pub struct StuckEndpoint {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Endpoint for StuckEndpoint {
    async fn write(&self, _scope: &WriteScope, _kind: FrameKind, _payload: Bytes) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Never completes a write on its own; only watches the scope's token, the
/// way nested work handed that token would.
pub struct TokenBoundEndpoint;

#[async_trait]
impl Endpoint for TokenBoundEndpoint {
    async fn write(&self, scope: &WriteScope, _kind: FrameKind, _payload: Bytes) -> Result<()> {
        scope.token().cancelled().await;
        Err(scope.error(scope.ended().unwrap_or(ScopeEnd::Cancelled)))
    }
}

/// Succeeds `ok_writes` times, then reports a broken connection.
pub struct FailingEndpoint {
    ok_writes: usize,
    pub calls: AtomicUsize,
}

impl FailingEndpoint {
    pub fn after(ok_writes: usize) -> Arc<Self> {
        Arc::new(Self {
            ok_writes,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Endpoint for FailingEndpoint {
    async fn write(&self, _scope: &WriteScope, _kind: FrameKind, _payload: Bytes) -> Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.ok_writes {
            Ok(())
        } else {
            Err(RelayError::Transport("connection reset".into()))
        }
    }
}

/// JSON, except messages of type `poison` fail to encode.
pub struct PickySerializer;

impl Serializer for PickySerializer {
    fn frame_kind(&self) -> FrameKind {
        FrameKind::Text
    }

    fn serialize(&self, msg: &Message) -> Result<Bytes> {
        if msg.msg_type == "poison" {
            return Err(RelayError::Encode("poisoned payload".into()));
        }
        JsonCodec.serialize(msg)
    }
}

/// Poll `cond` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
