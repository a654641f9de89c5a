//! # Domain Value Objects
//!
//! Immutable value types that represent gateway concepts without identity.
//!
//! ## Value Objects
//!
//! - **OpCode**: Frame operation code shared by every transport
//! - **SessionState**: Lifecycle state of one accepted connection
//! - **Protocol**: Transport selection (TCP or WebSocket)

mod op_code;
mod protocol;
mod session_state;

pub use op_code::*;
pub use protocol::*;
pub use session_state::*;
