//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpStream;

use conn_gateway::application::{Server, ServerOptions};
use conn_gateway::domain::{Agent, Conn, MessageListener, OpCode, Protocol, StateListener};
use conn_gateway::infrastructure::codec::tcp;
use conn_gateway::presentation::LoginAcceptor;
use conn_gateway::Result;

pub const MAX_PAYLOAD: usize = 64 * 1024;

/// Records everything the gateway reports and echoes inbound messages.
#[derive(Default)]
pub struct Recorder {
    pub messages: Mutex<Vec<(String, Bytes)>>,
    pub disconnects: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn disconnect_count(&self, channel_id: &str) -> usize {
        self.disconnects
            .lock()
            .iter()
            .filter(|id| id.as_str() == channel_id)
            .count()
    }
}

#[async_trait]
impl MessageListener for Recorder {
    async fn receive(&self, agent: Arc<dyn Agent>, payload: Bytes) {
        self.messages
            .lock()
            .push((agent.id().to_string(), payload.clone()));
        let _ = agent.push(payload).await;
    }
}

#[async_trait]
impl StateListener for Recorder {
    async fn disconnect(&self, channel_id: &str) -> Result<()> {
        self.disconnects.lock().push(channel_id.to_string());
        Ok(())
    }
}

/// Test gateway on an ephemeral loopback port
pub struct TestGateway {
    pub server: Server,
    pub recorder: Arc<Recorder>,
    pub addr: SocketAddr,
}

impl TestGateway {
    /// Start a gateway with the login acceptor and a recording echo listener
    pub async fn start(protocol: Protocol, options: ServerOptions) -> Self {
        let recorder = Arc::new(Recorder::default());
        let mut server = Server::new("test-gateway", "127.0.0.1:0", protocol).with_options(options);
        server.set_acceptor(Arc::new(LoginAcceptor::new()));
        server.set_message_listener(recorder.clone());
        server.set_state_listener(recorder.clone());
        server.start().await.expect("gateway should start");
        let addr = server.local_addr().expect("gateway should be bound");

        Self {
            server,
            recorder,
            addr,
        }
    }

    /// TCP gateway with the given heartbeat deadline
    pub async fn tcp(read_wait: Duration) -> Self {
        Self::start(Protocol::Tcp, options(read_wait)).await
    }

    pub async fn wait_registered(&self, channel_id: &str) {
        wait_until(&format!("{} to register", channel_id), || {
            self.server.channels().get(channel_id).is_some()
        })
        .await;
    }

    pub async fn wait_disconnected(&self, channel_id: &str) {
        wait_until(&format!("{} to disconnect", channel_id), || {
            self.recorder.disconnect_count(channel_id) > 0
        })
        .await;
    }
}

pub fn options(read_wait: Duration) -> ServerOptions {
    ServerOptions {
        read_wait,
        handshake_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(1),
        max_payload_size: MAX_PAYLOAD,
    }
}

/// Open a raw TCP connection and send the login frame
pub async fn tcp_login(addr: SocketAddr, channel_id: &str) -> Conn {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let mut conn = tcp::framed(stream, MAX_PAYLOAD);
    conn.write_frame(OpCode::Text, channel_id.to_string())
        .await
        .expect("write login");
    conn.flush().await.expect("flush login");
    conn
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
