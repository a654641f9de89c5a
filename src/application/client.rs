//! Outbound Client
//!
//! Dials a gateway through a pluggable [`Dialer`] and exposes a small
//! send/read/close surface. Reads and writes are serialized by separate
//! locks, so one task may block in `read` while others send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::{ConnReader, Dialer, DialerContext, Frame, FrameWriter, OpCode};
use crate::shared::error::{GatewayError, Result};

type SharedWriter = Arc<Mutex<Option<Box<dyn FrameWriter>>>>;

/// Client tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Budget for dial plus handshake
    pub dial_timeout: Duration,
    /// Deadline for each read; zero waits forever
    pub read_wait: Duration,
    /// Ping interval; zero disables the pinger
    pub heartbeat: Duration,
    /// Bound on each write+flush
    pub write_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(10),
            read_wait: Duration::ZERO,
            heartbeat: Duration::ZERO,
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Outbound connection to a gateway
pub struct Client {
    id: String,
    name: String,
    options: ClientOptions,
    dialer: Option<Arc<dyn Dialer>>,
    reader: Mutex<Option<ConnReader>>,
    writer: SharedWriter,
    connected: AtomicBool,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl Client {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            options: ClientOptions::default(),
            dialer: None,
            reader: Mutex::new(None),
            writer: Arc::new(Mutex::new(None)),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_dialer(&mut self, dialer: Arc<dyn Dialer>) {
        self.dialer = Some(dialer);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    /// Dial `address` and complete the handshake. No retries.
    pub async fn connect(&self, address: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::Closed);
        }
        let dialer = self
            .dialer
            .clone()
            .ok_or(GatewayError::NotConfigured("dialer"))?;
        if self.connected.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyConnected);
        }

        let timeout = self.options.dial_timeout;
        let ctx = DialerContext::new(&self.id, &self.name, address, timeout);
        let dialed = if timeout.is_zero() {
            dialer.dial_and_handshake(ctx).await
        } else {
            tokio::time::timeout(timeout, dialer.dial_and_handshake(ctx))
                .await
                .unwrap_or(Err(GatewayError::HandshakeTimeout(timeout)))
        };

        let mut conn = match dialed {
            Ok(conn) => conn,
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                tracing::debug!(client_id = %self.id, address, error = %e, "Dial failed");
                return Err(match e {
                    e if e.is_handshake() => e,
                    e => GatewayError::Handshake(e.to_string()),
                });
            }
        };
        conn.set_read_wait(self.options.read_wait);
        let (reader, writer) = conn.into_split();
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);

        if !self.options.heartbeat.is_zero() {
            tokio::spawn(heartbeat_loop(
                self.id.clone(),
                self.writer.clone(),
                self.options.heartbeat,
                self.options.write_timeout,
                self.shutdown.child_token(),
            ));
        }

        tracing::info!(client_id = %self.id, address, "Client connected");
        Ok(())
    }

    /// Send one Binary message.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.write(OpCode::Binary, payload.into()).await
    }

    /// Send one Text message.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.write(OpCode::Text, Bytes::from(text.into())).await
    }

    async fn write(&self, op_code: OpCode, payload: Bytes) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::Closed);
        }
        write_flush(&self.writer, op_code, payload, self.options.write_timeout).await
    }

    /// Next data frame from the gateway.
    ///
    /// Pong frames are swallowed and Ping frames answered. A Close frame
    /// closes the client and yields [`GatewayError::Closed`].
    pub async fn read(&self) -> Result<Frame> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::Closed);
        }
        let mut guard = self.reader.lock().await;
        loop {
            let reader = guard.as_mut().ok_or(GatewayError::Closed)?;
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                frame = reader.read_frame() => Some(frame?),
            };
            let Some(frame) = frame else {
                // `close` could not reach the reader while we held it.
                guard.take();
                return Err(GatewayError::Closed);
            };
            match frame.op_code() {
                OpCode::Pong => continue,
                OpCode::Ping => {
                    write_flush(
                        &self.writer,
                        OpCode::Pong,
                        frame.into_payload(),
                        self.options.write_timeout,
                    )
                    .await?;
                }
                OpCode::Close => {
                    tracing::debug!(client_id = %self.id, "Gateway closed the connection");
                    guard.take();
                    drop(guard);
                    self.close().await?;
                    return Err(GatewayError::Closed);
                }
                _ => return Ok(frame),
            }
        }
    }

    /// Send Close and release the transport. Safe to call repeatedly.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.cancel();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let timeout = self.options.write_timeout;
            let goodbye = async {
                // The transport may already be closing if the gateway said
                // goodbye first; still flush and shut the write side.
                if let Err(e) = writer.write_frame(OpCode::Close, Bytes::new()).await {
                    tracing::debug!(client_id = %self.id, error = %e, "Close frame rejected");
                }
                writer.close().await
            };
            let result = if timeout.is_zero() {
                goodbye.await
            } else {
                tokio::time::timeout(timeout, goodbye)
                    .await
                    .unwrap_or(Err(GatewayError::Closed))
            };
            if let Err(e) = result {
                tracing::debug!(client_id = %self.id, error = %e, "Close frame not delivered");
            }
        }
        // A reader blocked in `read` drops its half itself once it sees the shutdown.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }

        tracing::info!(client_id = %self.id, "Client closed");
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("options", &self.options)
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn write_flush(
    writer: &Mutex<Option<Box<dyn FrameWriter>>>,
    op_code: OpCode,
    payload: Bytes,
    timeout: Duration,
) -> Result<()> {
    let mut guard = writer.lock().await;
    let writer = guard.as_mut().ok_or(GatewayError::Closed)?;
    let write = async {
        writer.write_frame(op_code, payload).await?;
        writer.flush().await
    };
    if timeout.is_zero() {
        return write.await;
    }
    tokio::time::timeout(timeout, write)
        .await
        .map_err(|_| GatewayError::Transport(std::io::ErrorKind::TimedOut.into()))?
}

/// Keep the gateway's read deadline fresh while the client is idle.
async fn heartbeat_loop(
    client_id: String,
    writer: SharedWriter,
    every: Duration,
    write_timeout: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = write_flush(&writer, OpCode::Ping, Bytes::new(), write_timeout).await {
                    tracing::debug!(client_id = %client_id, error = %e, "Heartbeat stopped");
                    break;
                }
            }
        }
    }
}
