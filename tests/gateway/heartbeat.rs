//! Read-deadline heartbeat tests

use std::time::Duration;

use bytes::Bytes;
use conn_gateway::domain::OpCode;
use conn_gateway::GatewayError;

use crate::common::*;

/// A silent client is disconnected once the read wait elapses.
#[tokio::test]
async fn test_silent_client_times_out() {
    let gateway = TestGateway::tcp(Duration::from_millis(200)).await;
    let mut conn = tcp_login(gateway.addr, "u1").await;
    gateway.wait_registered("u1").await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    gateway.wait_disconnected("u1").await;

    let err = gateway.server.push("u1", "late").await.unwrap_err();
    assert!(matches!(err, GatewayError::ChannelNotFound(_)));

    // The transport is closed as part of the teardown.
    assert!(conn.read_frame().await.is_err());
    assert_eq!(gateway.recorder.disconnect_count("u1"), 1);
}

/// Pings refresh the deadline and are answered with Pong.
#[tokio::test]
async fn test_pings_keep_channel_alive() {
    let gateway = TestGateway::tcp(Duration::from_millis(200)).await;
    let mut conn = tcp_login(gateway.addr, "pinger").await;
    gateway.wait_registered("pinger").await;

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        conn.write_frame(OpCode::Ping, "hb").await.unwrap();
        conn.flush().await.unwrap();
        let pong = conn.read_frame().await.unwrap();
        assert_eq!(pong.op_code(), OpCode::Pong);
        assert_eq!(pong.payload(), &Bytes::from_static(b"hb"));
    }

    assert!(gateway.server.channels().get("pinger").is_some());
    assert_eq!(gateway.recorder.disconnect_count("pinger"), 0);
}

/// One session timing out leaves its neighbours untouched.
#[tokio::test]
async fn test_timeout_is_per_session() {
    let gateway = TestGateway::tcp(Duration::from_millis(300)).await;
    let _silent = tcp_login(gateway.addr, "silent").await;
    let mut chatty = tcp_login(gateway.addr, "chatty").await;
    gateway.wait_registered("silent").await;
    gateway.wait_registered("chatty").await;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        chatty.write_frame(OpCode::Binary, "tick").await.unwrap();
        chatty.flush().await.unwrap();
        assert_eq!(chatty.read_frame().await.unwrap().payload(), &Bytes::from_static(b"tick"));
    }

    gateway.wait_disconnected("silent").await;
    assert!(gateway.server.channels().get("chatty").is_some());
}
