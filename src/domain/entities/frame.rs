//! Frame entity.
//!
//! One protocol unit: an operation code plus its payload.

use bytes::Bytes;

use crate::domain::value_objects::OpCode;

/// A single logical frame as seen above the codec.
///
/// Codecs reassemble fragmented messages, so a frame surfaced to callers
/// never carries [`OpCode::Continuation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    op_code: OpCode,
    payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(op_code: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            op_code,
            payload: payload.into(),
        }
    }

    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Text, payload)
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Binary, payload)
    }

    pub fn close() -> Self {
        Self::new(OpCode::Close, Bytes::new())
    }

    pub fn ping() -> Self {
        Self::new(OpCode::Ping, Bytes::new())
    }

    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Pong, payload)
    }

    pub fn op_code(&self) -> OpCode {
        self.op_code
    }

    pub fn set_op_code(&mut self, op_code: OpCode) {
        self.op_code = op_code;
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Payload as UTF-8, if it is valid text.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn is_control(&self) -> bool {
        self.op_code.is_control()
    }
}
