//! End-to-end tests of the live-session endpoints over a real socket.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use analyzer_core::analysis::CriteriaKind;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &common::TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    client
}

/// Next non-ping frame, failing the test after a second of silence.
async fn next_frame(client: &mut Client) -> Message {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(1), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection ended")
            .expect("websocket error");
        if !matches!(frame, Message::Ping(_) | Message::Pong(_)) {
            return frame;
        }
    }
}

async fn next_json(client: &mut Client) -> Value {
    match next_frame(client).await {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn expect_close(client: &mut Client) -> u16 {
    match next_frame(client).await {
        Message::Close(Some(frame)) => u16::from(frame.code),
        other => panic!("expected a close frame, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: START streams one result per step and then a completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_streams_results_then_completion() {
    let app = common::build_test_app(3);
    app.add_job("pc-1", "u1", CriteriaKind::Score).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, "/ws/analysis?userId=u1").await;
    client
        .send(Message::Text(r#"{"command":"START","jobId":"pc-1"}"#.into()))
        .await
        .unwrap();

    for _ in 0..3 {
        let event = next_json(&mut client).await;
        assert_eq!(event["message"], "NEW_SCORE_EVAL_RESULT");
        assert_eq!(event["jobId"], "pc-1");
    }
    let done = next_json(&mut client).await;
    assert_eq!(done["message"], "SCORE_EVAL_COMPLETED");
    assert_eq!(done["jobId"], "pc-1");
}

// ---------------------------------------------------------------------------
// Test: curation jobs run on their own endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn curation_endpoint_runs_curation_jobs() {
    let app = common::build_test_app(2);
    app.add_job("pc-cur", "u1", CriteriaKind::Curation).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, "/ws/curation?userId=u1").await;
    client
        .send(Message::Text(
            r#"{"command":"START","projectCriteriaId":"pc-cur"}"#.into(),
        ))
        .await
        .unwrap();

    assert_eq!(next_json(&mut client).await["message"], "NEW_CURATION_RESULT");
    assert_eq!(next_json(&mut client).await["message"], "NEW_CURATION_RESULT");
    assert_eq!(next_json(&mut client).await["message"], "CURATION_COMPLETED");
}

// ---------------------------------------------------------------------------
// Test: a connection without userId is closed as unsupported
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_user_id_is_closed() {
    let app = common::build_test_app(1);
    let addr = serve(&app).await;

    let mut client = connect(addr, "/ws/analysis").await;
    assert_eq!(expect_close(&mut client).await, 1003);

    let mut blank = connect(addr, "/ws/visualization?userId=%20").await;
    assert_eq!(expect_close(&mut blank).await, 1003);
}

// ---------------------------------------------------------------------------
// Test: malformed frames get an INVALID_COMMAND reply and the session stays
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_frame_gets_error_reply() {
    let app = common::build_test_app(1);
    app.add_job("pc-1", "u1", CriteriaKind::Tagging).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, "/ws/analysis?userId=u1").await;

    client.send(Message::Text("not json".into())).await.unwrap();
    let reply = next_json(&mut client).await;
    assert_eq!(reply["message"], "INVALID_COMMAND");
    assert!(reply["error"].is_string());

    client
        .send(Message::Text(r#"{"command":"RESTART","jobId":"pc-1"}"#.into()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut client).await["message"], "INVALID_COMMAND");

    client
        .send(Message::Text(r#"{"command":"START","jobId":"pc-1"}"#.into()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut client).await["message"], "NEW_TAGGING_RESULT");
    assert_eq!(next_json(&mut client).await["message"], "TAGGING_COMPLETED");
}

// ---------------------------------------------------------------------------
// Test: a second connection for the same user replaces the first
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_connection_replaces_first() {
    let app = common::build_test_app(1);
    app.add_job("pc-1", "u1", CriteriaKind::Score).await;
    let addr = serve(&app).await;

    let mut first = connect(addr, "/ws/analysis?userId=u1").await;
    // Bind happens after the handshake; make sure the first session is live.
    first.send(Message::Text("{}".into())).await.unwrap();
    assert_eq!(next_json(&mut first).await["message"], "INVALID_COMMAND");

    let mut second = connect(addr, "/ws/analysis?userId=u1").await;
    assert_eq!(expect_close(&mut first).await, 1000);

    second
        .send(Message::Text(r#"{"command":"START","jobId":"pc-1"}"#.into()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut second).await["message"], "NEW_SCORE_EVAL_RESULT");
    assert_eq!(next_json(&mut second).await["message"], "SCORE_EVAL_COMPLETED");
}
