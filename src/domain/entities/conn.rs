//! Framed connection entity.
//!
//! A [`Conn`] pairs a frame reader with a frame writer over one transport.
//! The gateway hands it to the acceptor whole, then splits it so that one
//! task owns reading while writes go through a per-session lock.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::frame::Frame;
use crate::domain::value_objects::OpCode;
use crate::shared::error::{GatewayError, Result};

/// Read side of a framed transport.
#[async_trait]
pub trait FrameReader: Send {
    /// Read one complete logical frame.
    ///
    /// Implementations must be cancel safe: dropping the future between
    /// frames must not lose buffered input.
    async fn read_frame(&mut self) -> Result<Frame>;
}

/// Write side of a framed transport.
#[async_trait]
pub trait FrameWriter: Send {
    /// Serialize one frame into the write buffer.
    async fn write_frame(&mut self, op_code: OpCode, payload: Bytes) -> Result<()>;

    /// Push buffered frames to the transport.
    async fn flush(&mut self) -> Result<()>;

    /// Flush and shut down the write side. Calling it twice is harmless.
    async fn close(&mut self) -> Result<()>;
}

/// Read half with the heartbeat deadline applied to every read.
pub struct ConnReader {
    inner: Box<dyn FrameReader>,
    read_wait: Option<Duration>,
}

impl ConnReader {
    pub fn new(inner: Box<dyn FrameReader>, read_wait: Option<Duration>) -> Self {
        Self { inner, read_wait }
    }

    pub fn read_wait(&self) -> Option<Duration> {
        self.read_wait
    }

    pub fn set_read_wait(&mut self, read_wait: Option<Duration>) {
        self.read_wait = read_wait.filter(|wait| !wait.is_zero());
    }

    /// Read one frame, failing with [`GatewayError::Timeout`] once the
    /// read wait elapses.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        match self.read_wait {
            Some(wait) => tokio::time::timeout(wait, self.inner.read_frame())
                .await
                .map_err(|_| GatewayError::Timeout(wait))?,
            None => self.inner.read_frame().await,
        }
    }
}

/// A framed, full-duplex connection.
pub struct Conn {
    reader: ConnReader,
    writer: Box<dyn FrameWriter>,
    remote_addr: Option<SocketAddr>,
}

impl Conn {
    /// Create a connection from its two halves
    pub fn new(reader: Box<dyn FrameReader>, writer: Box<dyn FrameWriter>) -> Self {
        Self {
            reader: ConnReader::new(reader, None),
            writer,
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Set the read deadline; zero disables it.
    pub fn set_read_wait(&mut self, read_wait: Duration) {
        self.reader.set_read_wait(Some(read_wait));
    }

    pub fn read_wait(&self) -> Option<Duration> {
        self.reader.read_wait()
    }

    pub async fn read_frame(&mut self) -> Result<Frame> {
        self.reader.read_frame().await
    }

    pub async fn write_frame(
        &mut self,
        op_code: OpCode,
        payload: impl Into<Bytes> + Send,
    ) -> Result<()> {
        self.writer.write_frame(op_code, payload.into()).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }

    /// Split into an exclusively owned reader and a writer.
    pub fn into_split(self) -> (ConnReader, Box<dyn FrameWriter>) {
        (self.reader, self.writer)
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("remote_addr", &self.remote_addr)
            .field("read_wait", &self.reader.read_wait)
            .finish()
    }
}
