#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message as Frame;
use futures_util::stream;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Message;
use wsrelay_gateway::app_state::AppState;
use wsrelay_gateway::client::Client;
use wsrelay_gateway::config::RelayConfig;
use wsrelay_gateway::transport::ws::serve_session;
use wsrelay_gateway::transport::Endpoint;

use support::{FailingEndpoint, RecordingEndpoint};

const WAIT: Duration = Duration::from_secs(2);

type Inbound = mpsc::UnboundedSender<std::result::Result<Frame, Infallible>>;

/// Run a session over an in-memory inbound stream fed by the returned sender.
fn start(
    app: &AppState,
    endpoint: Arc<dyn Endpoint>,
) -> (Arc<Client>, Inbound, JoinHandle<Result<()>>) {
    let client = Arc::new(Client::with_options(endpoint, app.codec(), app.client_options()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let inbound = stream::poll_fn(move |cx| rx.poll_recv(cx));

    let handle = tokio::spawn({
        let app = app.clone();
        let client = Arc::clone(&client);
        async move { serve_session(&app, client, inbound).await }
    });
    (client, tx, handle)
}

fn text(raw: &str) -> std::result::Result<Frame, Infallible> {
    Ok(Frame::Text(raw.to_string()))
}

#[tokio::test]
async fn ready_comes_first_and_ping_gets_pong_in_the_same_room() {
    let app = AppState::new(RelayConfig::default()).unwrap();
    let (endpoint, mut written) = RecordingEndpoint::new();
    let (client, inbound, handle) = start(&app, endpoint);

    let ready = timeout(WAIT, written.recv()).await.unwrap().unwrap();
    assert_eq!(ready, Message::new("ready", json!({ "id": client.id() })));
    assert!(app.registry().get(client.id()).is_some());
    assert_eq!(app.metrics().clients_active.get(&[]), 1);

    inbound
        .send(text(r#"{"type":"ping","room":"lobby","payload":{"n":1}}"#))
        .unwrap();
    let pong = timeout(WAIT, written.recv()).await.unwrap().unwrap();
    assert_eq!(pong, Message::new("pong", json!({ "n": 1 })).with_room("lobby"));

    inbound.send(Ok(Frame::Close(None))).unwrap();
    let res = timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(res.is_ok());
}

#[tokio::test]
async fn malformed_frames_are_skipped_and_counted() {
    let app = AppState::new(RelayConfig::default()).unwrap();
    let (endpoint, mut written) = RecordingEndpoint::new();
    let (_client, inbound, handle) = start(&app, endpoint);
    let ready = timeout(WAIT, written.recv()).await.unwrap().unwrap();
    assert_eq!(ready.msg_type, "ready");

    inbound.send(text("not json")).unwrap();
    inbound.send(Ok(Frame::Binary(vec![0xff, 0x00]))).unwrap();
    inbound.send(text(r#"{"type":"ping","extra":true}"#)).unwrap();
    inbound.send(text(r#"{"type":"ping"}"#)).unwrap();

    // The session keeps reading past bad frames.
    let pong = timeout(WAIT, written.recv()).await.unwrap().unwrap();
    assert_eq!(pong.msg_type, "pong");
    assert_eq!(app.metrics().inbound_decode_errors.get(&[]), 3);

    // Peer gone without a close frame.
    drop(inbound);
    assert!(timeout(WAIT, handle).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn failed_delivery_stops_the_read_loop() {
    let app = AppState::new(RelayConfig::default()).unwrap();
    let (client, _inbound, handle) = start(&app, FailingEndpoint::after(0));

    // The inbound stream stays open; only the failed `ready` write ends the session.
    let res = timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(matches!(res, Err(RelayError::Transport(_))));
    assert!(app.registry().get(client.id()).is_none());
    assert_eq!(app.metrics().loop_exits.get(&[("code", "TRANSPORT")]), 1);
}

#[tokio::test]
async fn exit_deregisters_and_updates_client_gauges() {
    let app = AppState::new(RelayConfig::default()).unwrap();
    let (endpoint_a, mut written_a) = RecordingEndpoint::new();
    let (endpoint_b, mut written_b) = RecordingEndpoint::new();
    let (a, inbound_a, handle_a) = start(&app, endpoint_a);
    let (b, _inbound_b, handle_b) = start(&app, endpoint_b);
    timeout(WAIT, written_a.recv()).await.unwrap().unwrap();
    timeout(WAIT, written_b.recv()).await.unwrap().unwrap();

    let metrics = app.metrics();
    assert_eq!(app.registry().len(), 2);
    assert_eq!(metrics.clients_active.get(&[]), 2);

    inbound_a.send(Ok(Frame::Close(None))).unwrap();
    assert!(timeout(WAIT, handle_a).await.unwrap().unwrap().is_ok());
    assert!(app.registry().get(a.id()).is_none());
    assert!(app.registry().get(b.id()).is_some());
    assert_eq!(metrics.clients_active.get(&[]), 1);

    // Shutdown ends the remaining session even though its peer is still there.
    app.shutdown_token().cancel();
    let res = timeout(WAIT, handle_b).await.unwrap().unwrap();
    assert!(matches!(res, Err(RelayError::Cancelled)));
    assert!(app.registry().is_empty());
    assert_eq!(metrics.clients_active.get(&[]), 0);
    assert_eq!(metrics.clients_total.get(&[]), 2);
}
