//! Connection session lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of one accepted transport.
///
/// `Accepted -> Handshaking -> Active -> Closing -> Closed`; a failed
/// handshake jumps straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Accepted,
    Handshaking,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Accepted, Handshaking)
                | (Accepted, Closed)
                | (Handshaking, Active)
                | (Handshaking, Closed)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Handshaking => "handshaking",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
