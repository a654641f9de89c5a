//! WebSocket transport tests

use std::sync::Arc;
use std::time::Duration;

use conn_gateway::application::{Client, ClientOptions};
use conn_gateway::domain::{Frame, Protocol};
use conn_gateway::infrastructure::WebSocketDialer;
use pretty_assertions::assert_eq;

use crate::common::*;

async fn ws_gateway(read_wait: Duration) -> TestGateway {
    TestGateway::start(Protocol::WebSocket, options(read_wait)).await
}

fn ws_client(id: &str, options: ClientOptions) -> Client {
    let mut client = Client::new(id, "ws-test").with_options(options);
    client.set_dialer(Arc::new(WebSocketDialer::new(MAX_PAYLOAD)));
    client
}

#[tokio::test]
async fn test_websocket_echo_round_trip() {
    let gateway = ws_gateway(Duration::from_secs(10)).await;
    let client = ws_client("w1", ClientOptions::default());
    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("w1").await;

    client.send("binary").await.unwrap();
    assert_eq!(client.read().await.unwrap(), Frame::binary("binary"));

    client.send_text("text").await.unwrap();
    assert_eq!(client.read().await.unwrap(), Frame::binary("text"));

    gateway.server.push("w1", "pushed").await.unwrap();
    assert_eq!(client.read().await.unwrap(), Frame::binary("pushed"));

    client.close().await.unwrap();
    gateway.wait_disconnected("w1").await;
}

#[tokio::test]
async fn test_websocket_heartbeat_timeout() {
    let gateway = ws_gateway(Duration::from_millis(200)).await;
    let client = ws_client("w2", ClientOptions::default());
    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("w2").await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    gateway.wait_disconnected("w2").await;
    assert!(gateway.server.push("w2", "late").await.is_err());
}

#[tokio::test]
async fn test_websocket_client_pinger_keeps_channel() {
    let gateway = ws_gateway(Duration::from_millis(200)).await;
    let client = ws_client(
        "w3",
        ClientOptions {
            heartbeat: Duration::from_millis(50),
            ..ClientOptions::default()
        },
    );
    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("w3").await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(gateway.server.channels().get("w3").is_some());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_websocket_shutdown_closes_client() {
    let gateway = ws_gateway(Duration::from_secs(10)).await;
    let client = Arc::new(ws_client("w4", ClientOptions::default()));
    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("w4").await;

    let reader = {
        let client = client.clone();
        tokio::spawn(async move { client.read().await })
    };

    gateway.server.shutdown(Duration::from_secs(2)).await.unwrap();

    assert!(reader.await.unwrap().is_err());
    assert_eq!(gateway.recorder.disconnect_count("w4"), 1);
}
