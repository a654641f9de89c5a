//! Gateway Server
//!
//! Owns the listener, the channel map and the set of live session tasks.
//!
//! # Shutdown
//!
//! ```text
//! shutdown(deadline)
//!   ├─ stop accepting, close listener
//!   ├─ drain: every session sends Close and waits for the peer
//!   ├─ all sessions gone before deadline ──> Ok(())
//!   └─ deadline elapsed ──> drop every socket ──> Err(ShutdownDeadlineExceeded)
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::session::{self, SessionContext};
use crate::config::GatewaySettings;
use crate::domain::{Acceptor, ChannelMap, MessageListener, Protocol, StateListener};
use crate::infrastructure::metrics;
use crate::infrastructure::registry::ChannelRegistry;
use crate::shared::error::{GatewayError, Result};

/// Pause after a failed `accept` so a full fd table does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Time left for disconnect callbacks once every forced socket is closed.
const FORCE_GRACE: Duration = Duration::from_millis(500);

/// Per-session limits and deadlines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Heartbeat deadline for every read; zero disables it
    pub read_wait: Duration,
    /// Bound on transport upgrade plus acceptor
    pub handshake_timeout: Duration,
    /// Bound on each write+flush and on closing the transport
    pub write_timeout: Duration,
    /// Largest accepted message
    pub max_payload_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            read_wait: Duration::from_secs(180),
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            max_payload_size: 64 * 1024,
        }
    }
}

impl From<&GatewaySettings> for ServerOptions {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            read_wait: settings.read_wait(),
            handshake_timeout: settings.handshake_timeout(),
            write_timeout: settings.write_timeout(),
            max_payload_size: settings.max_payload_size,
        }
    }
}

/// Connection gateway
pub struct Server {
    id: String,
    listen: String,
    protocol: Protocol,
    options: ServerOptions,
    acceptor: Option<Arc<dyn Acceptor>>,
    message_listener: Option<Arc<dyn MessageListener>>,
    state_listener: Option<Arc<dyn StateListener>>,
    channels: Arc<dyn ChannelMap>,
    started: AtomicBool,
    local_addr: OnceLock<SocketAddr>,
    tracker: TaskTracker,
    /// One token per accepted socket, released once the socket is closed.
    transports: TaskTracker,
    accept_stop: CancellationToken,
    drain: CancellationToken,
    force: CancellationToken,
}

impl Server {
    /// Create an unstarted server listening on `listen` (`host:port`).
    pub fn new(id: impl Into<String>, listen: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            id: id.into(),
            listen: listen.into(),
            protocol,
            options: ServerOptions::default(),
            acceptor: None,
            message_listener: None,
            state_listener: None,
            channels: Arc::new(ChannelRegistry::new()),
            started: AtomicBool::new(false),
            local_addr: OnceLock::new(),
            tracker: TaskTracker::new(),
            transports: TaskTracker::new(),
            accept_stop: CancellationToken::new(),
            drain: CancellationToken::new(),
            force: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_acceptor(&mut self, acceptor: Arc<dyn Acceptor>) {
        self.acceptor = Some(acceptor);
    }

    pub fn set_message_listener(&mut self, listener: Arc<dyn MessageListener>) {
        self.message_listener = Some(listener);
    }

    pub fn set_state_listener(&mut self, listener: Arc<dyn StateListener>) {
        self.state_listener = Some(listener);
    }

    /// Heartbeat deadline for sessions accepted after this call.
    pub fn set_read_wait(&mut self, read_wait: Duration) {
        self.options.read_wait = read_wait;
    }

    /// Replace the default in-memory registry.
    pub fn set_channel_map(&mut self, channels: Arc<dyn ChannelMap>) {
        self.channels = channels;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Bound address, available once [`Server::start`] returned.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn channels(&self) -> &Arc<dyn ChannelMap> {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Bind the listener and start accepting in the background.
    ///
    /// Returns once the socket is bound. Fails if a listener is missing,
    /// the server already started or shutdown already began.
    pub async fn start(&self) -> Result<()> {
        if self.drain.is_cancelled() {
            return Err(GatewayError::ShuttingDown);
        }
        let acceptor = self
            .acceptor
            .clone()
            .ok_or(GatewayError::NotConfigured("acceptor"))?;
        let message_listener = self
            .message_listener
            .clone()
            .ok_or(GatewayError::NotConfigured("message listener"))?;
        let state_listener = self
            .state_listener
            .clone()
            .ok_or(GatewayError::NotConfigured("state listener"))?;
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyStarted);
        }

        let listener = match TcpListener::bind(self.listen.as_str()).await {
            Ok(listener) => listener,
            Err(e) => {
                self.started.store(false, Ordering::Release);
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr()?;
        let _ = self.local_addr.set(local_addr);

        let ctx = Arc::new(SessionContext {
            acceptor,
            message_listener,
            state_listener,
            channels: self.channels.clone(),
            options: self.options.clone(),
            protocol: self.protocol,
            drain: self.drain.clone(),
            force: self.force.clone(),
        });

        self.tracker.spawn(accept_loop(
            listener,
            ctx,
            self.tracker.clone(),
            self.transports.clone(),
            self.accept_stop.clone(),
        ));

        tracing::info!(
            server_id = %self.id,
            address = %local_addr,
            protocol = %self.protocol,
            "Gateway listening"
        );
        Ok(())
    }

    /// Deliver `payload` to a registered channel as one Binary message.
    pub async fn push(&self, channel_id: &str, payload: impl Into<Bytes>) -> Result<()> {
        if self.drain.is_cancelled() {
            return Err(GatewayError::ChannelNotFound(channel_id.to_string()));
        }
        self.channels.push(channel_id, payload.into()).await
    }

    /// Stop accepting and close every session within `timeout`.
    ///
    /// Sessions still open at the deadline are force closed and counted in
    /// [`GatewayError::ShutdownDeadlineExceeded`]; their sockets are closed
    /// by the time this returns. Calling it again is harmless.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        tracing::info!(
            server_id = %self.id,
            channels = self.channels.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Gateway shutting down"
        );
        self.accept_stop.cancel();
        self.drain.cancel();
        self.tracker.close();
        self.transports.close();

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            tracing::info!(server_id = %self.id, "Gateway stopped");
            return Ok(());
        }

        let remaining = self.tracker.len();
        tracing::warn!(
            server_id = %self.id,
            remaining,
            "Shutdown deadline exceeded, forcing sessions closed"
        );
        self.force.cancel();

        // Forced sessions abandon every pending write, so sockets go away
        // without waiting on the peer.
        self.transports.wait().await;
        if tokio::time::timeout(FORCE_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                server_id = %self.id,
                remaining = self.tracker.len(),
                "Disconnect callbacks still running after forced close"
            );
        }
        Err(GatewayError::ShutdownDeadlineExceeded { remaining })
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("id", &self.id)
            .field("listen", &self.listen)
            .field("protocol", &self.protocol)
            .field("options", &self.options)
            .field("local_addr", &self.local_addr.get())
            .field("channels", &self.channels.len())
            .finish()
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    tracker: TaskTracker,
    transports: TaskTracker,
    stop: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, remote_addr)) => {
                metrics::record_connection_accepted(ctx.protocol.as_str());
                let transport = transports.token();
                tracker.spawn(session::run(ctx.clone(), stream, remote_addr, transport));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
    tracing::debug!("Accept loop stopped");
}
