//! Gateway Session
//!
//! One task per accepted connection. The task runs the handshake,
//! registers the channel, owns the read side for the whole lifetime of the
//! connection and performs teardown exactly once.
//!
//! Writes come from two places: the session task itself (Pong, Close) and
//! any number of pushers. They are serialized by the write lock so frames
//! never interleave on the wire.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::Instrument;
use uuid::Uuid;

use super::server::ServerOptions;
use crate::domain::{
    Acceptor, Agent, ChannelMap, Conn, ConnReader, FrameWriter, MessageListener, OpCode,
    Protocol, SessionState, StateListener,
};
use crate::infrastructure::codec::{tcp, websocket};
use crate::infrastructure::metrics;
use crate::shared::error::{GatewayError, Result};

/// Everything a session task needs from its server.
pub(crate) struct SessionContext {
    pub acceptor: Arc<dyn Acceptor>,
    pub message_listener: Arc<dyn MessageListener>,
    pub state_listener: Arc<dyn StateListener>,
    pub channels: Arc<dyn ChannelMap>,
    pub options: ServerOptions,
    pub protocol: Protocol,
    /// Graceful shutdown: send Close and stop delivering messages.
    pub drain: CancellationToken,
    /// Deadline passed: drop the transport now.
    pub force: CancellationToken,
}

/// Why a registered channel went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer sent Close or hung up
    RemoteClose,
    /// Nothing arrived within the read wait
    ReadTimeout,
    /// The peer violated the framing rules
    Protocol,
    /// Transport level I/O failure
    Transport,
    /// A write to the peer failed or timed out
    WriteFailure,
    /// Graceful shutdown completed
    Shutdown,
    /// Shutdown deadline elapsed
    Forced,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteClose => "remote_close",
            Self::ReadTimeout => "read_timeout",
            Self::Protocol => "protocol",
            Self::Transport => "transport",
            Self::WriteFailure => "write_failure",
            Self::Shutdown => "shutdown",
            Self::Forced => "forced",
        }
    }

    /// Classify a read error. Anything ending a draining session counts as
    /// part of the shutdown.
    fn from_read_error(err: &GatewayError, draining: bool) -> Self {
        if draining {
            return Self::Shutdown;
        }
        match err {
            GatewayError::Timeout(_) => Self::ReadTimeout,
            GatewayError::Decode(_) => Self::Protocol,
            GatewayError::Closed => Self::RemoteClose,
            GatewayError::Transport(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Self::RemoteClose
            }
            _ => Self::Transport,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Write side of a session, guarded by the write lock.
struct WriteHalf {
    writer: Option<Box<dyn FrameWriter>>,
    /// Close has been sent; only the session task may still write.
    draining: bool,
}

impl WriteHalf {
    async fn send(&mut self, op_code: OpCode, payload: Bytes, timeout: Duration) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(GatewayError::Closed)?;
        let write = async {
            writer.write_frame(op_code, payload).await?;
            writer.flush().await
        };
        if timeout.is_zero() {
            return write.await;
        }
        tokio::time::timeout(timeout, write).await.map_err(|_| {
            GatewayError::Transport(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("write timed out after {:?}", timeout),
            ))
        })?
    }
}

/// A connection that completed its handshake.
///
/// Owned by its session task only; everything else reaches it through a
/// [`SessionAgent`].
pub struct Session {
    conn_id: Uuid,
    channel_id: String,
    remote_addr: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    state: RwLock<SessionState>,
    writer: Mutex<WriteHalf>,
    write_timeout: Duration,
    max_payload: usize,
    kill: CancellationToken,
    write_failed: AtomicBool,
}

impl Session {
    fn new(
        conn_id: Uuid,
        channel_id: String,
        writer: Box<dyn FrameWriter>,
        remote_addr: Option<SocketAddr>,
        write_timeout: Duration,
        max_payload: usize,
        kill: CancellationToken,
    ) -> Self {
        Self {
            conn_id,
            channel_id,
            remote_addr,
            connected_at: Utc::now(),
            state: RwLock::new(SessionState::Handshaking),
            writer: Mutex::new(WriteHalf {
                writer: Some(writer),
                draining: false,
            }),
            write_timeout,
            max_payload,
            kill,
            write_failed: AtomicBool::new(false),
        }
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn transition(&self, next: SessionState) {
        let mut state = self.state.write();
        if state.can_transition_to(next) {
            *state = next;
        } else {
            tracing::debug!(
                channel_id = %self.channel_id,
                from = %state.as_str(),
                to = %next,
                "Ignoring illegal session transition"
            );
        }
    }

    /// Write one frame and flush it. A failure tears the session down.
    ///
    /// Abandoned as soon as the session is killed.
    async fn send(&self, op_code: OpCode, payload: Bytes) -> Result<()> {
        let result = tokio::select! {
            biased;
            _ = self.kill.cancelled() => Err(GatewayError::Closed),
            result = async {
                self.writer
                    .lock()
                    .await
                    .send(op_code, payload, self.write_timeout)
                    .await
            } => result,
        };
        if let Err(e) = &result {
            self.fail_write(e);
        }
        result
    }

    /// Kill the session after a failed write. A session already killed keeps
    /// its original reason.
    fn fail_write(&self, err: &GatewayError) {
        if self.kill.is_cancelled() {
            return;
        }
        tracing::debug!(channel_id = %self.channel_id, error = %err, "Write failed");
        self.write_failed.store(true, Ordering::Release);
        self.kill.cancel();
    }

    fn kill_reason(&self) -> DisconnectReason {
        if self.write_failed.load(Ordering::Acquire) {
            DisconnectReason::WriteFailure
        } else {
            DisconnectReason::Forced
        }
    }

    /// Send Close and refuse further pushes.
    async fn begin_drain(&self) {
        let result = tokio::select! {
            biased;
            _ = self.kill.cancelled() => return,
            result = async {
                let mut half = self.writer.lock().await;
                half.draining = true;
                half.send(OpCode::Close, Bytes::new(), self.write_timeout)
                    .await
            } => result,
        };
        if let Err(e) = result {
            self.fail_write(&e);
        }
    }

    /// Push path: one Binary frame, refused once draining or closed.
    ///
    /// An oversized payload is rejected before touching the transport and
    /// leaves the session untouched.
    async fn deliver(&self, payload: Bytes) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(GatewayError::Decode(format!(
                "payload of {} bytes exceeds maximum {}",
                payload.len(),
                self.max_payload
            )));
        }
        let not_found = || GatewayError::ChannelNotFound(self.channel_id.clone());
        let result = tokio::select! {
            biased;
            _ = self.kill.cancelled() => Err(not_found()),
            result = async {
                let mut half = self.writer.lock().await;
                if half.draining || half.writer.is_none() {
                    Err(not_found())
                } else {
                    half.send(OpCode::Binary, payload, self.write_timeout).await
                }
            } => result,
        };
        match &result {
            Ok(()) | Err(GatewayError::ChannelNotFound(_)) | Err(GatewayError::Decode(_)) => {}
            Err(e) => self.fail_write(e),
        }
        result
    }

    /// Release the write half. A killed session drops it without flushing;
    /// otherwise pending bytes get up to the write timeout.
    async fn close_writer(&self) {
        let writer = self.writer.lock().await.writer.take();
        let Some(mut writer) = writer else {
            return;
        };
        if self.kill.is_cancelled() {
            tracing::debug!(channel_id = %self.channel_id, "Dropping transport without flush");
            return;
        }
        let close = async {
            if self.write_timeout.is_zero() {
                writer.close().await
            } else {
                tokio::time::timeout(self.write_timeout, writer.close())
                    .await
                    .unwrap_or(Err(GatewayError::Closed))
            }
        };
        let result = tokio::select! {
            biased;
            _ = self.kill.cancelled() => Err(GatewayError::Closed),
            result = close => result,
        };
        if let Err(e) = result {
            tracing::debug!(channel_id = %self.channel_id, error = %e, "Close did not complete");
        }
    }
}

/// Lookup-only handle stored in the channel map and given to business code.
///
/// Holds a weak reference, so the session task stays the sole owner of the
/// transport. Once the session is gone every push fails with
/// [`GatewayError::ChannelNotFound`].
#[derive(Clone)]
pub struct SessionAgent {
    channel_id: String,
    session: Weak<Session>,
}

impl SessionAgent {
    fn new(session: &Arc<Session>) -> Self {
        Self {
            channel_id: session.channel_id.clone(),
            session: Arc::downgrade(session),
        }
    }
}

#[async_trait]
impl Agent for SessionAgent {
    fn id(&self) -> &str {
        &self.channel_id
    }

    async fn push(&self, payload: Bytes) -> Result<()> {
        let result = match self.session.upgrade() {
            Some(session) => session.deliver(payload).await,
            None => Err(GatewayError::ChannelNotFound(self.channel_id.clone())),
        };
        metrics::record_push(result.is_ok());
        result
    }
}

impl std::fmt::Debug for SessionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAgent")
            .field("channel_id", &self.channel_id)
            .field("alive", &(self.session.strong_count() > 0))
            .finish()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conn_id", &self.conn_id)
            .field("channel_id", &self.channel_id)
            .field("remote_addr", &self.remote_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Drive one accepted connection from handshake to teardown.
///
/// `transport` is held until the socket has been released, which is what
/// [`Server::shutdown`](super::Server::shutdown) waits for.
pub(crate) async fn run(
    ctx: Arc<SessionContext>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    transport: TaskTrackerToken,
) {
    let conn_id = Uuid::new_v4();
    let span = tracing::debug_span!("session", conn_id = %conn_id, remote_addr = %remote_addr);
    lifecycle(ctx, stream, conn_id, transport)
        .instrument(span)
        .await
}

async fn lifecycle(
    ctx: Arc<SessionContext>,
    stream: TcpStream,
    conn_id: Uuid,
    transport: TaskTrackerToken,
) {
    let handshake_timeout = ctx.options.handshake_timeout;
    let outcome = tokio::select! {
        _ = ctx.drain.cancelled() => Err(GatewayError::ShuttingDown),
        result = tokio::time::timeout(handshake_timeout, handshake(&ctx, stream)) => {
            result.unwrap_or(Err(GatewayError::HandshakeTimeout(handshake_timeout)))
        }
    };

    let (conn, channel_id) = match outcome {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::debug!(error = %e, category = e.category(), "Handshake failed");
            metrics::record_handshake_failure(e.category());
            return;
        }
    };

    let remote_addr = conn.remote_addr();
    let (reader, writer) = conn.into_split();
    let session = Arc::new(Session::new(
        conn_id,
        channel_id,
        writer,
        remote_addr,
        ctx.options.write_timeout,
        ctx.options.max_payload_size,
        ctx.force.child_token(),
    ));

    if ctx.drain.is_cancelled() {
        tracing::debug!(channel_id = %session.channel_id, "Shutting down, dropping new channel");
        session.close_writer().await;
        session.transition(SessionState::Closed);
        return;
    }

    let agent: Arc<dyn Agent> = Arc::new(SessionAgent::new(&session));
    if let Err(e) = ctx.channels.add(agent.clone()) {
        tracing::warn!(channel_id = %session.channel_id, error = %e, "Rejecting connection");
        metrics::record_handshake_failure(e.category());
        session.close_writer().await;
        session.transition(SessionState::Closed);
        return;
    }

    session.transition(SessionState::Active);
    metrics::channel_opened();
    tracing::info!(channel_id = %session.channel_id, "Channel connected");

    let reason = serve(&ctx, &session, agent, reader).await;
    teardown(&ctx, &session, reason, transport).await;
}

/// Upgrade the transport if needed and run the acceptor.
async fn handshake(ctx: &SessionContext, stream: TcpStream) -> Result<(Conn, String)> {
    let max_payload = ctx.options.max_payload_size;
    let mut conn = match ctx.protocol {
        Protocol::Tcp => tcp::framed(stream, max_payload),
        Protocol::WebSocket => {
            let remote_addr = stream.peer_addr().ok();
            let ws = tokio_tungstenite::accept_async_with_config(
                stream,
                Some(websocket::config(max_payload)),
            )
            .await
            .map_err(|e| GatewayError::Handshake(format!("websocket upgrade: {}", e)))?;
            let conn = websocket::framed(ws);
            match remote_addr {
                Some(addr) => conn.with_remote_addr(addr),
                None => conn,
            }
        }
    };

    let channel_id = ctx
        .acceptor
        .accept(&mut conn, ctx.options.handshake_timeout)
        .await
        .map_err(|e| match e {
            e if e.is_handshake() => e,
            e => GatewayError::Handshake(e.to_string()),
        })?;
    if channel_id.is_empty() {
        return Err(GatewayError::Handshake(
            "acceptor returned an empty channel id".into(),
        ));
    }

    conn.set_read_wait(ctx.options.read_wait);
    Ok((conn, channel_id))
}

/// The read loop. Returns once the session must end.
async fn serve(
    ctx: &SessionContext,
    session: &Session,
    agent: Arc<dyn Agent>,
    mut reader: ConnReader,
) -> DisconnectReason {
    let mut draining = false;

    loop {
        let read = tokio::select! {
            biased;
            _ = session.kill.cancelled() => return session.kill_reason(),
            _ = ctx.drain.cancelled(), if !draining => {
                draining = true;
                session.begin_drain().await;
                continue;
            }
            read = reader.read_frame() => read,
        };

        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                let reason = DisconnectReason::from_read_error(&e, draining);
                tracing::debug!(channel_id = %session.channel_id, error = %e, %reason, "Read ended");
                return reason;
            }
        };

        match frame.op_code() {
            OpCode::Close if draining => return DisconnectReason::Shutdown,
            OpCode::Close => return DisconnectReason::RemoteClose,
            OpCode::Ping if draining => {}
            OpCode::Ping => {
                if session.send(OpCode::Pong, frame.into_payload()).await.is_err() {
                    return session.kill_reason();
                }
            }
            OpCode::Pong => {}
            OpCode::Text | OpCode::Binary if draining => {
                tracing::trace!(channel_id = %session.channel_id, "Discarding message while draining");
            }
            OpCode::Text | OpCode::Binary => {
                metrics::record_message_received();
                tokio::select! {
                    biased;
                    _ = session.kill.cancelled() => return session.kill_reason(),
                    _ = ctx.message_listener.receive(agent.clone(), frame.into_payload()) => {}
                }
            }
            // Readers reassemble fragments before handing frames out.
            OpCode::Continuation => return DisconnectReason::Protocol,
        }
    }
}

async fn teardown(
    ctx: &SessionContext,
    session: &Session,
    reason: DisconnectReason,
    transport: TaskTrackerToken,
) {
    session.transition(SessionState::Closing);
    ctx.channels.remove(&session.channel_id);
    session.close_writer().await;
    drop(transport);
    session.transition(SessionState::Closed);

    metrics::channel_closed();
    metrics::record_disconnect(reason.as_str());
    let connected_for = Utc::now() - session.connected_at;
    tracing::info!(
        channel_id = %session.channel_id,
        reason = %reason,
        connected_secs = connected_for.num_seconds(),
        "Channel disconnected"
    );

    if let Err(e) = ctx.state_listener.disconnect(&session.channel_id).await {
        tracing::warn!(channel_id = %session.channel_id, error = %e, "Disconnect callback failed");
    }
}
