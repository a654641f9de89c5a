//! Frame operation codes.

use crate::shared::error::GatewayError;

/// Operation code carried by every frame.
///
/// Values follow the WebSocket numbering so both transports share one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation of a fragmented data message
    Continuation = 0x0,
    /// UTF-8 text payload
    Text = 0x1,
    /// Opaque binary payload
    Binary = 0x2,
    /// Connection close
    Close = 0x8,
    /// Liveness probe
    Ping = 0x9,
    /// Liveness reply
    Pong = 0xA,
}

impl OpCode {
    /// Control frames are protocol housekeeping and never reach business code.
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Data frames carry application payload.
    pub fn is_data(self) -> bool {
        !self.is_control()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpCode::Continuation => "continuation",
            OpCode::Text => "text",
            OpCode::Binary => "binary",
            OpCode::Close => "close",
            OpCode::Ping => "ping",
            OpCode::Pong => "pong",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = GatewayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(GatewayError::Decode(format!("invalid opcode 0x{:x}", other))),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
