//! Transport protocol selection.

use serde::{Deserialize, Serialize};

/// Transport a gateway listens on or a dialer connects with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Length-prefixed frames over raw TCP
    #[default]
    Tcp,
    /// RFC 6455 WebSocket
    #[serde(alias = "ws")]
    WebSocket,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::WebSocket => "websocket",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
