//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Bind the socket's write half to a `Client` and run its delivery loop
//! - Read inbound frames (decode once), answer `ping` through the mailbox
//! - Lifecycle: close the mailbox when the peer leaves, stop reading when
//!   delivery fails, deregister on exit

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message as Frame, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::{FrameKind, Message};

use crate::app_state::AppState;
use crate::client::{Client, MailboxSink, ScopeEnd, WriteScope};
use crate::transport::codec::{decode, Inbound};
use crate::transport::Endpoint;

/// Write half of an upgraded socket.
pub struct WsEndpoint {
    sink: Mutex<SplitSink<WebSocket, Frame>>,
}

impl WsEndpoint {
    pub fn new(sink: SplitSink<WebSocket, Frame>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Best-effort close frame; the relay itself never calls this. Also
    /// flushes anything a cancelled write left in the sink.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Frame::Close(None)).await;
        let _ = sink.close().await;
    }
}

/// Ends with the scope's error once its token fires. The cut-off send may
/// already have queued the frame in the sink.
#[async_trait]
impl Endpoint for WsEndpoint {
    async fn write(&self, scope: &WriteScope, kind: FrameKind, payload: Bytes) -> Result<()> {
        let frame = match kind {
            FrameKind::Text => Frame::Text(
                String::from_utf8(payload.to_vec())
                    .map_err(|e| RelayError::Encode(format!("text payload is not utf-8: {e}")))?,
            ),
            FrameKind::Binary => Frame::Binary(payload.to_vec()),
        };

        tokio::select! {
            biased;
            _ = scope.token().cancelled() => {
                Err(scope.error(scope.ended().unwrap_or(ScopeEnd::Cancelled)))
            }
            res = async {
                let mut sink = self.sink.lock().await;
                sink.send(frame).await
            } => res.map_err(|e| RelayError::Transport(e.to_string())),
        }
    }
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| {
        let tracker = app.tracker().clone();
        tracker.track_future(run_session(app, socket))
    })
}

// --------------------
// Session
// --------------------
async fn run_session(app: AppState, socket: WebSocket) {
    let (ws_tx, ws_rx) = socket.split();
    let endpoint = Arc::new(WsEndpoint::new(ws_tx));
    let client = Arc::new(Client::with_options(
        endpoint.clone(),
        app.codec(),
        app.client_options(),
    ));

    let res = serve_session(&app, client, ws_rx).await;
    if sends_close_frame(&res) {
        endpoint.close().await;
    }
}

/// A write cut off by its scope may leave its frame buffered in the sink, and
/// a close would flush it. After a transport failure the socket is dropped
/// without a close frame.
fn sends_close_frame(res: &Result<()>) -> bool {
    !matches!(res, Err(e) if e.is_transport_failure())
}

/// Serve one connected client over the inbound frames of its socket.
///
/// Registers `client`, enqueues `ready`, runs the delivery loop next to the
/// read loop, then deregisters. Returns once the peer leaves, delivery stops
/// or the gateway shuts down, with the delivery loop's result.
pub async fn serve_session<S, E>(app: &AppState, client: Arc<Client>, inbound: S) -> Result<()>
where
    S: Stream<Item = std::result::Result<Frame, E>> + Unpin,
{
    let span = tracing::info_span!("client", id = %client.id());
    async move {
        let metrics = app.metrics();
        metrics.clients_total.inc(&[]);
        metrics.clients_active.inc(&[]);
        app.registry().insert(Arc::clone(&client));
        tracing::info!("client connected");

        let res = serve_client(app, &client, inbound).await;

        app.registry().remove(client.id());
        metrics.clients_active.dec(&[]);
        match &res {
            Ok(()) => tracing::info!("client disconnected"),
            Err(e) => tracing::info!(code = e.code(), error = %e, "client disconnected"),
        }
        res
    }
    .instrument(span)
    .await
}

async fn serve_client<S, E>(app: &AppState, client: &Arc<Client>, mut inbound: S) -> Result<()>
where
    S: Stream<Item = std::result::Result<Frame, E>> + Unpin,
{
    let ctx = app.shutdown_token().child_token();
    let outbound = client.outbound();

    // Fresh mailbox: cannot be full.
    outbound.try_send(Message::new("ready", json!({ "id": client.id() })))?;

    let mut delivery = tokio::spawn(
        {
            let client = Arc::clone(client);
            let ctx = ctx.clone();
            async move { client.run_delivery_loop(&ctx).await }
        }
        .in_current_span(),
    );

    let mut finished: Option<Result<()>> = None;
    loop {
        tokio::select! {
            res = &mut delivery => {
                finished = Some(joined(res));
                break;
            }
            _ = ctx.cancelled() => break,
            incoming = inbound.next() => {
                let Some(Ok(frame)) = incoming else { break; };
                match decode(frame, app.codec().as_ref()) {
                    Ok(Inbound::Msg { msg, bytes_len }) => {
                        tracing::trace!(msg_type = %msg.msg_type, bytes_len, "inbound message");
                        on_message(app, &outbound, &ctx, msg).await;
                    }
                    Ok(Inbound::Ping(_)) | Ok(Inbound::Pong(_)) => {}
                    Ok(Inbound::Close) => break,
                    Err(e) => {
                        app.metrics().inbound_decode_errors.inc(&[]);
                        tracing::debug!(error = %e, "dropping malformed frame");
                    }
                }
            }
        }
    }

    client.close();
    match finished {
        Some(res) => res,
        None => joined(delivery.await),
    }
}

async fn on_message(app: &AppState, outbound: &MailboxSink, ctx: &CancellationToken, msg: Message) {
    if msg.msg_type != "ping" {
        // Routing between peers is up to producers holding a registry handle.
        tracing::debug!(msg_type = %msg.msg_type, "no handler for inbound message");
        return;
    }
    let pong = Message::new("pong", msg.payload).with_room(msg.room);
    if let Err(e) = outbound.send(pong, ctx).await {
        app.metrics().enqueue_rejected.inc(&[("code", e.code())]);
        tracing::debug!(code = e.code(), "pong not enqueued");
    }
}

fn joined(res: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    res.unwrap_or_else(|e| Err(RelayError::Internal(format!("delivery task failed: {e}"))))
}
