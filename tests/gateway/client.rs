//! Outbound client tests against a TCP gateway

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conn_gateway::application::{Client, ClientOptions};
use conn_gateway::domain::{Conn, Dialer, DialerContext, Frame};
use conn_gateway::infrastructure::TcpDialer;
use conn_gateway::{GatewayError, Result};
use pretty_assertions::assert_eq;

use crate::common::*;

fn tcp_client(id: &str) -> Client {
    let mut client = Client::new(id, "tcp-test");
    client.set_dialer(Arc::new(TcpDialer::new(MAX_PAYLOAD)));
    client
}

#[tokio::test]
async fn test_tcp_echo_round_trip() {
    let gateway = TestGateway::tcp(Duration::from_secs(10)).await;
    let client = tcp_client("c1");
    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("c1").await;

    client.send("hello").await.unwrap();
    assert_eq!(client.read().await.unwrap(), Frame::binary("hello"));

    let messages = gateway.recorder.messages.lock().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "c1");
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let gateway = TestGateway::tcp(Duration::from_secs(10)).await;
    let client = tcp_client("c2");
    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("c2").await;

    client.close().await.unwrap();
    client.close().await.unwrap();

    assert!(matches!(client.send("x").await, Err(GatewayError::Closed)));
    assert!(matches!(client.read().await, Err(GatewayError::Closed)));

    gateway.wait_disconnected("c2").await;
    assert_eq!(gateway.recorder.disconnect_count("c2"), 1);
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = tcp_client("c3");
    let err = client.connect(&addr.to_string()).await.unwrap_err();
    assert!(err.is_handshake());

    // A failed dial leaves the client usable for another attempt.
    let gateway = TestGateway::tcp(Duration::from_secs(10)).await;
    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("c3").await;
}

#[tokio::test]
async fn test_dial_timeout() {
    let gateway = TestGateway::tcp(Duration::from_secs(10)).await;
    let mut client = Client::new("c4", "tcp-test").with_options(ClientOptions {
        dial_timeout: Duration::from_millis(100),
        ..ClientOptions::default()
    });
    client.set_dialer(Arc::new(StallOnceDialer::new()));

    let started = Instant::now();
    let err = client.connect(&gateway.addr.to_string()).await.unwrap_err();
    assert!(matches!(err, GatewayError::HandshakeTimeout(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!client.is_connected());

    client.connect(&gateway.addr.to_string()).await.unwrap();
    gateway.wait_registered("c4").await;
}

/// Hangs on the first dial, then behaves like a plain TCP dialer.
struct StallOnceDialer {
    stalled: AtomicBool,
    inner: TcpDialer,
}

impl StallOnceDialer {
    fn new() -> Self {
        Self {
            stalled: AtomicBool::new(false),
            inner: TcpDialer::new(MAX_PAYLOAD),
        }
    }
}

#[async_trait]
impl Dialer for StallOnceDialer {
    async fn dial_and_handshake(&self, ctx: DialerContext) -> Result<Conn> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.inner.dial_and_handshake(ctx).await
    }
}
