//! Length-prefixed TCP framing.
//!
//! Wire layout of one frame:
//!
//! ```text
//! +--------+--------+--------+--------+--------+---------------- - -
//! |F|RRR|op|          payload length (u32, BE)  |  payload ...
//! +--------+--------+--------+--------+--------+---------------- - -
//! ```
//!
//! `F` marks the final fragment of a message and `RRR` must be zero.
//! Fragmented Text/Binary messages are reassembled before they are surfaced.

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};

use crate::domain::{Conn, Frame, FrameReader, FrameWriter, OpCode};
use crate::shared::error::{GatewayError, Result};

/// Header size: flags/opcode byte plus a 4 byte length.
pub const HEADER_LEN: usize = 5;

const FIN_BIT: u8 = 0x80;
const RESERVED_BITS: u8 = 0x70;
const OPCODE_MASK: u8 = 0x0F;

/// A single frame exactly as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub fin: bool,
    pub op_code: OpCode,
    pub payload: Bytes,
}

impl WireFrame {
    /// A complete, unfragmented frame
    pub fn new(op_code: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            op_code,
            payload: payload.into(),
        }
    }

    /// A fragment; `fin` marks the last one.
    pub fn fragment(op_code: OpCode, payload: impl Into<Bytes>, fin: bool) -> Self {
        Self {
            fin,
            op_code,
            payload: payload.into(),
        }
    }
}

/// Codec for [`WireFrame`]s with a payload size limit.
#[derive(Debug, Clone)]
pub struct TcpFrameCodec {
    max_payload: usize,
}

impl TcpFrameCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Decoder for TcpFrameCodec {
    type Item = WireFrame;
    type Error = GatewayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireFrame>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let head = src[0];
        if head & RESERVED_BITS != 0 {
            return Err(GatewayError::Decode(format!(
                "reserved bits set in frame header 0x{:02x}",
                head
            )));
        }
        let fin = head & FIN_BIT != 0;
        let op_code = OpCode::try_from(head & OPCODE_MASK)?;
        if op_code.is_control() && !fin {
            return Err(GatewayError::Decode(format!(
                "fragmented {} frame",
                op_code
            )));
        }

        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > self.max_payload {
            return Err(GatewayError::Decode(format!(
                "payload of {} bytes exceeds maximum {}",
                len, self.max_payload
            )));
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(WireFrame {
            fin,
            op_code,
            payload,
        }))
    }
}

impl Encoder<WireFrame> for TcpFrameCodec {
    type Error = GatewayError;

    fn encode(&mut self, frame: WireFrame, dst: &mut BytesMut) -> Result<()> {
        let len = frame.payload.len();
        if len > self.max_payload || len > u32::MAX as usize {
            return Err(GatewayError::Decode(format!(
                "payload of {} bytes exceeds maximum {}",
                len, self.max_payload
            )));
        }

        let mut head = u8::from(frame.op_code);
        if frame.fin {
            head |= FIN_BIT;
        }

        dst.reserve(HEADER_LEN + len);
        dst.put_u8(head);
        dst.put_u32(len as u32);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

/// Turns a stream of wire fragments into complete logical frames.
#[derive(Debug)]
pub struct Reassembler {
    max_message: usize,
    partial: Option<(OpCode, BytesMut)>,
}

impl Reassembler {
    pub fn new(max_message: usize) -> Self {
        Self {
            max_message,
            partial: None,
        }
    }

    /// Feed one wire frame; returns a frame once a message is complete.
    ///
    /// Control frames may arrive between fragments and pass straight through.
    pub fn push(&mut self, wire: WireFrame) -> Result<Option<Frame>> {
        match wire.op_code {
            op if op.is_control() => Ok(Some(Frame::new(op, wire.payload))),
            OpCode::Continuation => {
                let Some((_, buf)) = self.partial.as_mut() else {
                    return Err(GatewayError::Decode(
                        "continuation frame without a started message".into(),
                    ));
                };
                if buf.len() + wire.payload.len() > self.max_message {
                    return Err(GatewayError::Decode(format!(
                        "reassembled message exceeds maximum {}",
                        self.max_message
                    )));
                }
                buf.extend_from_slice(&wire.payload);
                if !wire.fin {
                    return Ok(None);
                }
                Ok(self
                    .partial
                    .take()
                    .map(|(op, buf)| Frame::new(op, buf.freeze())))
            }
            op => {
                if self.partial.is_some() {
                    return Err(GatewayError::Decode(format!(
                        "{} frame while a fragmented message is open",
                        op
                    )));
                }
                if wire.fin {
                    return Ok(Some(Frame::new(op, wire.payload)));
                }
                self.partial = Some((op, BytesMut::from(&wire.payload[..])));
                Ok(None)
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.partial.is_none()
    }
}

/// Read half of a TCP framed transport.
pub struct TcpFrameReader<R> {
    frames: FramedRead<R, TcpFrameCodec>,
    reassembler: Reassembler,
}

impl<R: AsyncRead + Unpin> TcpFrameReader<R> {
    pub fn new(inner: R, max_payload: usize) -> Self {
        Self {
            frames: FramedRead::new(inner, TcpFrameCodec::new(max_payload)),
            reassembler: Reassembler::new(max_payload),
        }
    }
}

#[async_trait]
impl<R> FrameReader for TcpFrameReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            let wire = self.frames.next().await.ok_or_else(GatewayError::eof)??;
            if let Some(frame) = self.reassembler.push(wire)? {
                return Ok(frame);
            }
        }
    }
}

/// Write half of a TCP framed transport.
pub struct TcpFrameWriter<W> {
    frames: FramedWrite<W, TcpFrameCodec>,
    closed: bool,
}

impl<W: AsyncWrite + Unpin> TcpFrameWriter<W> {
    pub fn new(inner: W, max_payload: usize) -> Self {
        Self {
            frames: FramedWrite::new(inner, TcpFrameCodec::new(max_payload)),
            closed: false,
        }
    }
}

#[async_trait]
impl<W> FrameWriter for TcpFrameWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, op_code: OpCode, payload: Bytes) -> Result<()> {
        if self.closed {
            return Err(GatewayError::Closed);
        }
        if op_code == OpCode::Continuation {
            return Err(GatewayError::Decode(
                "continuation frames cannot be written directly".into(),
            ));
        }
        self.frames.feed(WireFrame::new(op_code, payload)).await
    }

    async fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(GatewayError::Closed);
        }
        self.frames.flush().await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.frames.close().await
    }
}

/// Frame an accepted or dialed TCP stream.
pub fn framed(stream: TcpStream, max_payload: usize) -> Conn {
    let remote_addr = stream.peer_addr().ok();
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }
    let (read_half, write_half) = stream.into_split();
    let conn = framed_io(read_half, write_half, max_payload);
    match remote_addr {
        Some(addr) => conn.with_remote_addr(addr),
        None => conn,
    }
}

/// Frame any pair of byte halves with the TCP wire format.
pub fn framed_io<R, W>(read_half: R, write_half: W, max_payload: usize) -> Conn
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    Conn::new(
        Box::new(TcpFrameReader::new(read_half, max_payload)),
        Box::new(TcpFrameWriter::new(write_half, max_payload)),
    )
}
