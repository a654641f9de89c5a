//! WebSocket framing on top of `tokio-tungstenite`.
//!
//! Fragmented messages are reassembled by the library, so readers only
//! ever yield whole Text/Binary messages and control frames.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use crate::domain::{Conn, Frame, FrameReader, FrameWriter, OpCode};
use crate::shared::error::{GatewayError, Result};

/// Library limits matching the gateway's maximum payload.
pub fn config(max_payload: usize) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(max_payload))
        .max_frame_size(Some(max_payload))
}

/// Read half of a WebSocket transport.
pub struct WsFrameReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameReader for WsFrameReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            let message = self.stream.next().await.ok_or_else(GatewayError::eof)??;
            let op_code = match &message {
                Message::Text(_) => OpCode::Text,
                Message::Binary(_) => OpCode::Binary,
                Message::Ping(_) => OpCode::Ping,
                Message::Pong(_) => OpCode::Pong,
                Message::Close(_) => OpCode::Close,
                // Raw frames are only produced on the write path.
                Message::Frame(_) => continue,
            };
            return Ok(Frame::new(op_code, message.into_data()));
        }
    }
}

/// Write half of a WebSocket transport.
pub struct WsFrameWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

fn to_message(op_code: OpCode, payload: Bytes) -> Result<Message> {
    let message = match op_code {
        OpCode::Text => {
            let text = String::from_utf8(payload.to_vec())
                .map_err(|e| GatewayError::Decode(format!("text payload is not UTF-8: {}", e)))?;
            Message::text(text)
        }
        OpCode::Binary => Message::binary(payload),
        OpCode::Ping => Message::Ping(payload),
        OpCode::Pong => Message::Pong(payload),
        OpCode::Close => Message::Close(None),
        OpCode::Continuation => {
            return Err(GatewayError::Decode(
                "continuation frames cannot be written directly".into(),
            ))
        }
    };
    Ok(message)
}

#[async_trait]
impl<S> FrameWriter for WsFrameWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, op_code: OpCode, payload: Bytes) -> Result<()> {
        if self.closed {
            return Err(GatewayError::Closed);
        }
        let message = to_message(op_code, payload)?;
        self.sink.feed(message).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(GatewayError::Closed);
        }
        self.sink.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.sink.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Frame an upgraded WebSocket stream.
pub fn framed<S>(ws: WebSocketStream<S>) -> Conn
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    Conn::new(
        Box::new(WsFrameReader { stream }),
        Box::new(WsFrameWriter {
            sink,
            closed: false,
        }),
    )
}
