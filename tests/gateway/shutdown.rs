//! Graceful and forced shutdown tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use conn_gateway::application::ServerOptions;
use conn_gateway::domain::{OpCode, Protocol};
use conn_gateway::GatewayError;

use crate::common::*;

/// Sessions that never answer Close are forced shut at the deadline.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_deadline_with_silent_sessions() {
    let gateway = TestGateway::tcp(Duration::from_secs(30)).await;

    let mut conns = Vec::new();
    for i in 0..100 {
        conns.push(tcp_login(gateway.addr, &format!("s{}", i)).await);
    }
    wait_until("100 channels", || gateway.server.channel_count() == 100).await;

    let started = Instant::now();
    let err = gateway
        .server
        .shutdown(Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(matches!(err, GatewayError::ShutdownDeadlineExceeded { remaining: 100 }));

    assert_eq!(gateway.server.channel_count(), 0);
    assert_eq!(gateway.recorder.disconnects.lock().len(), 100);

    for conn in conns.iter_mut() {
        let close = tokio::time::timeout(Duration::from_secs(1), conn.read_frame())
            .await
            .expect("close frame")
            .expect("close frame");
        assert_eq!(close.op_code(), OpCode::Close);

        let eof = tokio::time::timeout(Duration::from_secs(1), conn.read_frame())
            .await
            .expect("transport closed");
        assert!(eof.is_err());
    }
}

/// A peer that stopped reading cannot hold its socket open past the deadline,
/// even with a push stuck on a full send buffer.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_forced_shutdown_releases_stalled_writer() {
    let gateway = TestGateway::start(
        Protocol::Tcp,
        ServerOptions {
            write_timeout: Duration::from_secs(5),
            ..options(Duration::from_secs(30))
        },
    )
    .await;
    let mut conn = tcp_login(gateway.addr, "stuck").await;
    gateway.wait_registered("stuck").await;

    let delivered = AtomicUsize::new(0);
    let pusher = async {
        let payload = vec![7u8; 60 * 1024];
        loop {
            match gateway.server.push("stuck", payload.clone()).await {
                Ok(()) => {
                    delivered.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => return e,
            }
        }
    };
    let stop = async {
        // Socket buffers are full once pushes stop completing.
        let mut last = usize::MAX;
        loop {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let now = delivered.load(Ordering::SeqCst);
            if now == last {
                break;
            }
            last = now;
        }

        let started = Instant::now();
        let result = gateway.server.shutdown(Duration::from_millis(100)).await;
        (result, started.elapsed())
    };
    let (push_err, (result, elapsed)) = tokio::join!(pusher, stop);

    assert!(elapsed < Duration::from_secs(2), "shutdown took {:?}", elapsed);
    assert!(matches!(
        result,
        Err(GatewayError::ShutdownDeadlineExceeded { remaining: 1 })
    ));
    assert_eq!(push_err.category(), "not_found");
    assert!(gateway.server.channels().get("stuck").is_none());
    assert_eq!(gateway.recorder.disconnect_count("stuck"), 1);

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while conn.read_frame().await.is_ok() {}
    })
    .await;
    assert!(closed.is_ok(), "transport should be closed");
}

/// Peers answering Close let shutdown finish before the deadline.
#[tokio::test]
async fn test_graceful_shutdown() {
    let gateway = TestGateway::tcp(Duration::from_secs(30)).await;

    let mut peers = Vec::new();
    for id in ["a", "b", "c"] {
        let mut conn = tcp_login(gateway.addr, id).await;
        gateway.wait_registered(id).await;
        peers.push(tokio::spawn(async move {
            loop {
                match conn.read_frame().await {
                    Ok(frame) if frame.op_code() == OpCode::Close => {
                        conn.write_frame(OpCode::Close, "").await.unwrap();
                        conn.flush().await.unwrap();
                        return true;
                    }
                    Ok(_) => continue,
                    Err(_) => return false,
                }
            }
        }));
    }

    gateway.server.shutdown(Duration::from_secs(5)).await.unwrap();

    for peer in peers {
        assert!(peer.await.unwrap(), "peer should have seen Close");
    }
    let mut disconnects = gateway.recorder.disconnects.lock().clone();
    disconnects.sort();
    assert_eq!(disconnects, vec!["a", "b", "c"]);
}

/// Nothing new is accepted or delivered once shutdown started.
#[tokio::test]
async fn test_no_start_or_push_after_shutdown() {
    let gateway = TestGateway::tcp(Duration::from_secs(30)).await;
    gateway.server.shutdown(Duration::from_secs(1)).await.unwrap();

    assert!(matches!(
        gateway.server.start().await,
        Err(GatewayError::ShuttingDown)
    ));
    assert!(matches!(
        gateway.server.push("anyone", "x").await,
        Err(GatewayError::ChannelNotFound(_))
    ));
    assert!(tokio::net::TcpStream::connect(gateway.addr).await.is_err());
}
