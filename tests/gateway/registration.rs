//! Handshake and registration tests

use std::time::Duration;

use conn_gateway::domain::{Conn, OpCode};

use crate::common::*;

/// True if the gateway closed this connection within `wait`.
async fn closed_within(conn: &mut Conn, wait: Duration) -> bool {
    matches!(tokio::time::timeout(wait, conn.read_frame()).await, Ok(Err(_)))
}

/// Two handshakes claiming the same ID: the first one to register wins.
#[tokio::test]
async fn test_duplicate_channel_id() {
    let gateway = TestGateway::tcp(Duration::from_secs(10)).await;

    let (mut first, mut second) = tokio::join!(
        tcp_login(gateway.addr, "dup"),
        tcp_login(gateway.addr, "dup")
    );
    gateway.wait_registered("dup").await;

    let wait = Duration::from_millis(500);
    let (first_closed, second_closed) =
        tokio::join!(closed_within(&mut first, wait), closed_within(&mut second, wait));
    assert!(first_closed ^ second_closed, "exactly one duplicate must be rejected");
    assert_eq!(gateway.server.channel_count(), 1);
    assert!(gateway.recorder.disconnects.lock().is_empty());

    let winner = if first_closed { &mut second } else { &mut first };
    winner.write_frame(OpCode::Close, "").await.unwrap();
    winner.flush().await.unwrap();

    gateway.wait_disconnected("dup").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gateway.recorder.disconnect_count("dup"), 1);
}

/// A failed handshake drops the connection without a disconnect callback.
#[tokio::test]
async fn test_rejected_login_has_no_callback() {
    let gateway = TestGateway::tcp(Duration::from_secs(10)).await;

    let mut conn = tcp_login(gateway.addr, "   ").await;

    assert!(closed_within(&mut conn, Duration::from_secs(2)).await);
    assert_eq!(gateway.server.channel_count(), 0);
    assert!(gateway.recorder.disconnects.lock().is_empty());
}

/// The disconnect callback fires once even when several triggers race.
#[tokio::test]
async fn test_disconnect_fires_exactly_once() {
    let gateway = TestGateway::tcp(Duration::from_millis(300)).await;
    let mut conn = tcp_login(gateway.addr, "once").await;
    gateway.wait_registered("once").await;

    let server = &gateway.server;
    let pusher = async {
        for _ in 0..50 {
            if server.push("once", "spam").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    let closer = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = conn.write_frame(OpCode::Close, "").await;
        let _ = conn.flush().await;
        drop(conn);
    };
    tokio::join!(pusher, closer);

    gateway.wait_disconnected("once").await;
    // Outlive the read deadline so a second trigger would have fired by now.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(gateway.recorder.disconnect_count("once"), 1);
}

/// Inbound messages reach the listener in arrival order.
#[tokio::test]
async fn test_messages_delivered_in_order() {
    let gateway = TestGateway::tcp(Duration::from_secs(10)).await;
    let mut conn = tcp_login(gateway.addr, "ordered").await;
    gateway.wait_registered("ordered").await;

    for i in 0..10u8 {
        conn.write_frame(OpCode::Binary, vec![i]).await.unwrap();
    }
    conn.flush().await.unwrap();
    for i in 0..10u8 {
        assert_eq!(conn.read_frame().await.unwrap().payload().as_ref(), &[i]);
    }

    let messages = gateway.recorder.messages.lock();
    let received: Vec<u8> = messages
        .iter()
        .filter(|(id, _)| id == "ordered")
        .map(|(_, payload)| payload[0])
        .collect();
    assert_eq!(received, (0..10u8).collect::<Vec<_>>());
}
